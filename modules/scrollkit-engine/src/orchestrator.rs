//! Correlates a UI-triggered "load more" action with the asynchronous
//! arrival of its paginated response.
//!
//! The trigger and the response are only loosely coupled: the button may
//! need several clicks before the underlying request actually fires, and
//! unrelated traffic shares the page. Matching is done by the driver via
//! the entity type's query fingerprint plus the first-page marker; this
//! module owns the retry/backoff policy around it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use scrollkit_core::RawPage;

use crate::shutdown::ShutdownSignal;
use crate::traits::AutomationDriver;

/// Failed attempts before the orchestrator gives up and yields `None`.
const MAX_RETRIES: u32 = 10;

/// Trigger attempts per fetch attempt. The click races a short request
/// wait; several clicks may be needed before one fires a request.
const MAX_TRIGGER_TRIES: u32 = 10;

/// Timing knobs, hoisted so tests can shrink them.
#[derive(Debug, Clone)]
pub struct OrchestratorTiming {
    /// Race window between a trigger and the matching request firing.
    pub request_race: Duration,
    /// Bound on awaiting the full matching response body.
    pub response_wait: Duration,
    /// Backoff unit; the delay after failed attempt n is `n² × unit`.
    pub backoff_unit: Duration,
    /// Settle delay after a successful fetch, letting the page render
    /// before the next trigger.
    pub settle: Duration,
}

impl Default for OrchestratorTiming {
    fn default() -> Self {
        Self {
            request_race: Duration::from_secs(1),
            response_wait: Duration::from_secs(100),
            backoff_unit: Duration::from_secs(1),
            settle: Duration::from_millis(500),
        }
    }
}

enum Attempt {
    Page(RawPage),
    /// No trigger element on the page at all.
    NoTrigger,
    Failed,
}

pub struct LoadMoreOrchestrator {
    driver: Arc<dyn AutomationDriver>,
    timing: OrchestratorTiming,
    shutdown: ShutdownSignal,
}

impl LoadMoreOrchestrator {
    pub fn new(driver: Arc<dyn AutomationDriver>, shutdown: ShutdownSignal) -> Self {
        Self {
            driver,
            timing: OrchestratorTiming::default(),
            shutdown,
        }
    }

    pub fn with_timing(mut self, timing: OrchestratorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Trigger the next page fetch and wait for its response.
    ///
    /// `None` means no more data is reachable this attempt: either the
    /// trigger element is gone, or every retry failed. Transient
    /// correlation timeouts never surface as errors; they only feed the
    /// retry counter.
    pub async fn request_next_page(&self, entity_id: &str) -> anyhow::Result<Option<RawPage>> {
        let mut attempt = 0u32;
        loop {
            if self.shutdown.is_shutdown() {
                return Ok(None);
            }

            match self.attempt_once(entity_id).await? {
                Attempt::Page(page) => {
                    self.pause(self.timing.settle).await;
                    return Ok(Some(page));
                }
                Attempt::NoTrigger => {
                    debug!(entity = entity_id, "no load-more trigger on page");
                    return Ok(None);
                }
                Attempt::Failed => {}
            }

            attempt += 1;
            if attempt > MAX_RETRIES {
                warn!(
                    entity = entity_id,
                    retries = MAX_RETRIES,
                    "no paginated response after exhausting retries"
                );
                return Ok(None);
            }

            let delay = self.timing.backoff_unit * (attempt * attempt);
            debug!(entity = entity_id, attempt, ?delay, "retrying load-more after backoff");
            if !self.pause(delay).await {
                return Ok(None);
            }
        }
    }

    async fn attempt_once(&self, entity_id: &str) -> anyhow::Result<Attempt> {
        // Click/request race: trigger attempt N is not assumed to pair
        // with request N, only "some trigger eventually fired a request".
        let mut request_fired = false;
        for _ in 0..MAX_TRIGGER_TRIES {
            if self.shutdown.is_shutdown() {
                return Ok(Attempt::Failed);
            }

            if !self.driver.trigger_action(entity_id).await? {
                return Ok(Attempt::NoTrigger);
            }

            if self
                .driver
                .wait_for_matching_request(entity_id, self.timing.request_race)
                .await?
            {
                request_fired = true;
                break;
            }
        }

        if !request_fired {
            debug!(entity = entity_id, "trigger never produced a matching request");
            return Ok(Attempt::Failed);
        }

        match self.await_response(entity_id).await {
            Ok(Some(page)) => Ok(Attempt::Page(page)),
            Ok(None) => {
                debug!(entity = entity_id, "matching response did not arrive in time");
                Ok(Attempt::Failed)
            }
            Err(err) => {
                warn!(entity = entity_id, error = %err, "failed to read paginated response");
                Ok(Attempt::Failed)
            }
        }
    }

    async fn await_response(&self, entity_id: &str) -> anyhow::Result<Option<RawPage>> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            page = self
                .driver
                .wait_for_matching_response(entity_id, self.timing.response_wait) => page,
            _ = shutdown.cancelled() => Ok(None),
        }
    }

    /// Cancellable sleep. Returns `false` when shutdown cut it short.
    async fn pause(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;
    use crate::testing::{comment_page, MockDriver};
    use tokio::time::Instant;

    fn fast_timing() -> OrchestratorTiming {
        OrchestratorTiming {
            request_race: Duration::from_millis(10),
            response_wait: Duration::from_millis(100),
            backoff_unit: Duration::from_secs(1),
            settle: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_fetch_returns_the_page() {
        let driver = Arc::new(MockDriver::new().on_response(Some(comment_page(&["c1"], 100))));
        let (_handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver.clone(), signal).with_timing(fast_timing());

        let page = orchestrator.request_next_page("post-1").await.unwrap();
        assert!(page.is_some());
        assert_eq!(driver.response_waits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_trigger_yields_none_without_retries() {
        let driver = Arc::new(MockDriver::new().on_trigger(&[false]));
        let (_handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver.clone(), signal).with_timing(fast_timing());

        let page = orchestrator.request_next_page("post-1").await.unwrap();
        assert!(page.is_none());
        assert_eq!(driver.response_waits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn several_clicks_may_precede_the_matching_request() {
        // First two clicks fire no request; the third does.
        let driver = Arc::new(
            MockDriver::new()
                .on_request_wait(&[false, false, true])
                .on_response(Some(comment_page(&["c1"], 100))),
        );
        let (_handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver.clone(), signal).with_timing(fast_timing());

        let page = orchestrator.request_next_page("post-1").await.unwrap();
        assert!(page.is_some());
        assert_eq!(driver.trigger_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_quadratically_until_exhaustion() {
        // Responses never arrive. Delays must be 1²..10² units with the
        // 11th failure yielding None without a further delay.
        let driver = Arc::new(MockDriver::new());
        let (_handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver.clone(), signal).with_timing(OrchestratorTiming {
                request_race: Duration::ZERO,
                response_wait: Duration::ZERO,
                backoff_unit: Duration::from_secs(1),
                settle: Duration::ZERO,
            });

        let started = Instant::now();
        let page = orchestrator.request_next_page("post-1").await.unwrap();

        assert!(page.is_none());
        // 1 + 4 + 9 + ... + 100 = 385 backoff seconds in total.
        assert_eq!(started.elapsed(), Duration::from_secs(385));
        assert_eq!(driver.response_waits(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_failures_stops_retrying() {
        let driver = Arc::new(
            MockDriver::new()
                .on_response(None)
                .on_response(None)
                .on_response(Some(comment_page(&["c1"], 100))),
        );
        let (_handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver.clone(), signal).with_timing(OrchestratorTiming {
                request_race: Duration::ZERO,
                response_wait: Duration::ZERO,
                backoff_unit: Duration::from_secs(1),
                settle: Duration::ZERO,
            });

        let started = Instant::now();
        let page = orchestrator.request_next_page("post-1").await.unwrap();

        assert!(page.is_some());
        // Two failures: backoffs of 1s and 4s.
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(driver.response_waits(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_backoff_promptly() {
        let driver = Arc::new(MockDriver::new());
        let (handle, signal) = shutdown_channel();
        let orchestrator =
            LoadMoreOrchestrator::new(driver, signal).with_timing(OrchestratorTiming {
                request_race: Duration::ZERO,
                response_wait: Duration::ZERO,
                backoff_unit: Duration::from_secs(60),
                settle: Duration::ZERO,
            });

        let started = Instant::now();
        let task = tokio::spawn(async move { orchestrator.request_next_page("post-1").await });
        // Let the first attempt fail and the 60s backoff begin.
        tokio::task::yield_now().await;
        handle.shutdown();

        let page = task.await.unwrap().unwrap();
        assert!(page.is_none());
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
