// Trait seams for the engine's external collaborators.
//
// AutomationDriver — the browser-automation side: UI triggers, request/
//   response correlation, page liveness. Implementations match responses
//   by the entity type's query fingerprint plus the first-page marker.
// RecordSink — downstream delivery of accepted records.
// StateCheckpoint — host-driven persistence of the scroll-state map.
//
// These enable deterministic testing with MockDriver and MemorySink:
// no browser, no network. See `testing`.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use scrollkit_core::{OutputRecord, RawPage, ScrollState};

#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Fire the UI action that requests the next page (a "load more"
    /// click, a scroll). Returns `false` when no trigger element exists
    /// on the page.
    async fn trigger_action(&self, entity_id: &str) -> Result<bool>;

    /// Wait until a request matching this entity's pagination fingerprint
    /// is issued by the page. Returns `false` on timeout. Used only for
    /// the click/request race: a trigger may need several attempts before
    /// the underlying request actually fires.
    async fn wait_for_matching_request(&self, entity_id: &str, timeout: Duration) -> Result<bool>;

    /// Wait for the body of the matching paginated response. `None` on
    /// timeout or unparseable body.
    async fn wait_for_matching_response(
        &self,
        entity_id: &str,
        timeout: Duration,
    ) -> Result<Option<RawPage>>;

    /// Liveness of the host page/browser context.
    async fn is_page_usable(&self) -> bool;
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one accepted record downstream. Must be durable before
    /// returning: the dedup state treats a returned `Ok` as "emitted",
    /// and only then records the id.
    async fn emit(&self, record: &OutputRecord) -> Result<()>;
}

/// Load/save of the full scroll-state map, keyed by entity id. The host
/// decides when to checkpoint; the engine never calls this itself.
#[async_trait]
pub trait StateCheckpoint: Send + Sync {
    async fn load(&self) -> Result<Option<HashMap<String, ScrollState>>>;
    async fn save(&self, states: &HashMap<String, ScrollState>) -> Result<()>;
}
