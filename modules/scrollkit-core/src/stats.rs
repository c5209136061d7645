use serde::Serialize;

/// Aggregated counters for one entity's scroll run. The host merges these
/// into its own telemetry at checkpoint boundaries.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScrollStats {
    pub pages_fetched: u64,
    pub accepted: u64,
    pub duplicates_skipped: u64,
    pub out_of_window: u64,
    pub all_duplicate_batches: u64,
}
