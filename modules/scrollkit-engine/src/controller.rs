//! The driving control loop: fetch, translate, filter, decide.
//!
//! Shared by every entity-type-specific caller. One controller instance
//! serves one worker; iterations for a single entity id never overlap.

use std::sync::Arc;

use tracing::{debug, info, warn};

use scrollkit_core::{
    EntityType, PaginationStateStore, RunOptions, ScrollError, ScrollStats, TranslatedPage,
};

use crate::orchestrator::{LoadMoreOrchestrator, OrchestratorTiming};
use crate::project::project_batch;
use crate::shutdown::ShutdownSignal;
use crate::sink::DeduplicatingItemSink;
use crate::traits::{AutomationDriver, RecordSink};
use crate::translate::translate;

/// Outcome of one controller iteration. There is no error state:
/// collaborator errors propagate as `ScrollError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Done,
}

pub struct ScrollLoopController {
    driver: Arc<dyn AutomationDriver>,
    store: Arc<PaginationStateStore>,
    orchestrator: LoadMoreOrchestrator,
    sink: DeduplicatingItemSink,
    options: RunOptions,
    shutdown: ShutdownSignal,
    stats: ScrollStats,
}

impl ScrollLoopController {
    pub fn new(
        driver: Arc<dyn AutomationDriver>,
        store: Arc<PaginationStateStore>,
        output: Arc<dyn RecordSink>,
        options: RunOptions,
        shutdown: ShutdownSignal,
    ) -> Self {
        let orchestrator = LoadMoreOrchestrator::new(driver.clone(), shutdown.clone());
        let sink = DeduplicatingItemSink::new(store.clone(), output, options.clone());
        Self {
            driver,
            store,
            orchestrator,
            sink,
            options,
            shutdown,
            stats: ScrollStats::default(),
        }
    }

    pub fn with_timing(mut self, timing: OrchestratorTiming) -> Self {
        self.orchestrator = self.orchestrator.with_timing(timing);
        self
    }

    pub fn stats(&self) -> &ScrollStats {
        &self.stats
    }

    /// Loop `step` until the stream terminates or shutdown is requested.
    pub async fn run(
        &mut self,
        entity_id: &str,
        entity_type: EntityType,
    ) -> Result<(), ScrollError> {
        loop {
            if self.shutdown.is_shutdown() {
                debug!(entity = entity_id, "shutdown requested, abandoning scroll loop");
                return Ok(());
            }
            if self.step(entity_id, entity_type).await? == LoopState::Done {
                return Ok(());
            }
        }
    }

    /// One turn of the scroll state machine.
    pub async fn step(
        &mut self,
        entity_id: &str,
        entity_type: EntityType,
    ) -> Result<LoopState, ScrollError> {
        let limit = self.options.effective_limit();
        if limit == 0 {
            return Ok(LoopState::Done);
        }
        if !self.driver.is_page_usable().await {
            debug!(entity = entity_id, "page no longer usable, stopping");
            return Ok(LoopState::Done);
        }

        let state = self.store.get_or_create(entity_id)?;
        if state.with(|s| s.reached_time_boundary) {
            return Ok(LoopState::Done);
        }

        let old_count = state.accepted_count();

        let Some(raw) = self.orchestrator.request_next_page(entity_id).await? else {
            if entity_type.trigger_absence_is_terminal() {
                debug!(entity = entity_id, "load-more trigger gone, stream exhausted");
                return Ok(LoopState::Done);
            }
            // Post feeds also load through plain scrolling; a missing
            // button this turn is not proof of exhaustion.
            return Ok(LoopState::Running);
        };

        let page = match translate(entity_type, &raw) {
            Ok(page) => page,
            Err(ScrollError::MalformedResponse(reason)) => {
                // Usually the page stopped exposing the query (content
                // removed or made private); wind down instead of crashing.
                warn!(
                    entity = entity_id,
                    url = %raw.url,
                    %reason,
                    "malformed paginated response, treating as final page"
                );
                TranslatedPage::terminal()
            }
            Err(err) => return Err(err),
        };
        self.stats.pages_fetched += 1;

        state.with(|s| s.merge_has_next_page(page.has_next_page));

        let records = project_batch(entity_type, entity_id, &page.items, old_count);
        let outcome = self.sink.accept(entity_id, &records, old_count).await?;
        self.stats.accepted += outcome.accepted as u64;
        self.stats.duplicates_skipped += outcome.duplicates as u64;
        self.stats.out_of_window += outcome.out_of_window as u64;

        let (reached_boundary, new_count, all_duplicates, has_next_page) = state.with(|s| {
            (
                s.reached_time_boundary,
                s.accepted_count(),
                s.all_duplicates_in_last_batch,
                s.has_next_page,
            )
        });

        if reached_boundary {
            info!(entity = entity_id, "time boundary reached, stopping");
            return Ok(LoopState::Done);
        }
        if new_count >= limit {
            info!(entity = entity_id, limit, "result limit reached, stopping");
            return Ok(LoopState::Done);
        }
        if !has_next_page {
            info!(
                entity = entity_id,
                accepted = new_count,
                total = ?page.total_count,
                "no further pages"
            );
            return Ok(LoopState::Done);
        }
        if new_count != old_count {
            debug!(
                entity = entity_id,
                accepted = new_count,
                total = ?page.total_count,
                "forward progress, continuing"
            );
            return Ok(LoopState::Running);
        }
        if all_duplicates {
            self.stats.all_duplicate_batches += 1;
            // Duplicates prove overlap with earlier pages, not exhaustion.
            debug!(entity = entity_id, "batch was all duplicates, continuing");
            return Ok(LoopState::Running);
        }

        // Transient empty batches are common; take another turn rather
        // than ending the stream early.
        Ok(LoopState::Running)
    }
}
