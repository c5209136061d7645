//! Deduplicating, limit- and window-enforcing sink.
//!
//! The only place scroll state is mutated. Emission goes to the
//! `RecordSink` collaborator before an id is recorded as accepted, so a
//! crash between the two redelivers at most once on recovery rather than
//! losing a record.

use std::sync::Arc;

use tracing::{debug, info};

use scrollkit_core::{OutputRecord, PaginationStateStore, RunOptions, ScrollError};

use crate::traits::RecordSink;

/// Per-batch result. `accepted` is the number of newly accepted records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub duplicates: usize,
    pub out_of_window: usize,
}

pub struct DeduplicatingItemSink {
    store: Arc<PaginationStateStore>,
    output: Arc<dyn RecordSink>,
    options: RunOptions,
}

impl DeduplicatingItemSink {
    pub fn new(
        store: Arc<PaginationStateStore>,
        output: Arc<dyn RecordSink>,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            output,
            options,
        }
    }

    /// Filter one batch against state, emit what passes, update state.
    ///
    /// `start_position` is the accepted count the batch was projected at;
    /// only used for log attribution. A record without an id aborts the
    /// whole batch before anything is emitted: dedup and resumability
    /// both key on ids, so a partial pass over an unsafe batch is worse
    /// than none.
    pub async fn accept(
        &self,
        entity_id: &str,
        batch: &[OutputRecord],
        start_position: u64,
    ) -> Result<BatchOutcome, ScrollError> {
        let limit = self.options.effective_limit();
        let mut outcome = BatchOutcome::default();

        if limit == 0 || batch.is_empty() {
            return Ok(outcome);
        }

        let mut ids = Vec::with_capacity(batch.len());
        for record in batch {
            match record.id.as_deref() {
                Some(id) if !id.is_empty() => ids.push(id),
                _ => {
                    return Err(ScrollError::MissingId {
                        entity: entity_id.to_string(),
                    })
                }
            }
        }

        let state = self.store.get_or_create(entity_id)?;
        state.with(|s| s.all_duplicates_in_last_batch = false);

        let window = &self.options.window;
        let all_out_of_window = batch.iter().all(|record| !window.admits(record.timestamp));

        for (record, id) in batch.iter().zip(ids) {
            let at_limit = state.with(|s| s.accepted_count() >= limit);
            if at_limit {
                info!(
                    entity = entity_id,
                    limit, "reached configured result limit, stopping batch"
                );
                break;
            }

            if !window.admits(record.timestamp) {
                outcome.out_of_window += 1;
                continue;
            }

            if state.with(|s| s.accepted_ids.contains(id)) {
                outcome.duplicates += 1;
                continue;
            }

            // Emit first; the id is only recorded once delivery succeeded.
            self.output.emit(record).await?;
            state.with(|s| s.accepted_ids.insert(id.to_string()));
            outcome.accepted += 1;
        }

        state.with(|s| {
            if all_out_of_window && s.accepted_count() > 0 {
                info!(entity = entity_id, "batch fell entirely outside the time window");
                s.mark_time_boundary();
            }
            s.all_duplicates_in_last_batch = outcome.accepted == 0;
        });

        debug!(
            entity = entity_id,
            start_position,
            accepted = outcome.accepted,
            duplicates = outcome.duplicates,
            out_of_window = outcome.out_of_window,
            "batch processed"
        );

        Ok(outcome)
    }
}
