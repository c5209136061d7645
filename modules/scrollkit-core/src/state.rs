//! Per-entity scroll state and the keyed store that owns it.
//!
//! One `ScrollState` per scraped entity. The store hands out cheap
//! handles; the host checkpoints the whole map through `snapshot` /
//! `hydrate` so a restarted process resumes instead of re-emitting.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ScrollError;

/// Mutable scroll/dedup state for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollState {
    /// Monotonic: once false, never true again. Guards against stale or
    /// reordered responses resurrecting an exhausted stream.
    pub has_next_page: bool,
    /// Sticky: the most recent batch fell entirely outside the configured
    /// time window.
    pub reached_time_boundary: bool,
    /// Recomputed every batch: the last batch produced zero newly
    /// accepted records.
    pub all_duplicates_in_last_batch: bool,
    /// Every id ever accepted for this entity. Bounded by the run limit.
    pub accepted_ids: HashSet<String>,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            has_next_page: true,
            reached_time_boundary: false,
            all_duplicates_in_last_batch: false,
            accepted_ids: HashSet::new(),
        }
    }
}

impl ScrollState {
    pub fn accepted_count(&self) -> u64 {
        self.accepted_ids.len() as u64
    }

    /// Forward-progress merge: a later `false` wins, a later `true` never
    /// flips an exhausted stream back.
    pub fn merge_has_next_page(&mut self, observed: bool) {
        if !observed {
            self.has_next_page = false;
        }
    }

    /// Sticky once set.
    pub fn mark_time_boundary(&mut self) {
        self.reached_time_boundary = true;
    }
}

/// Handle to one entity's state. Locking is internal so no guard can be
/// held across an await point.
#[derive(Debug, Clone, Default)]
pub struct EntityState(Arc<Mutex<ScrollState>>);

impl EntityState {
    fn new(state: ScrollState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ScrollState) -> R) -> R {
        let mut guard = self.0.lock().expect("scroll state lock poisoned");
        f(&mut guard)
    }

    pub fn snapshot(&self) -> ScrollState {
        self.with(|state| state.clone())
    }

    pub fn accepted_count(&self) -> u64 {
        self.with(|state| state.accepted_count())
    }
}

/// Keyed store of per-entity scroll state. `get_or_create` is safe for
/// concurrent callers working on different entity ids; per-id state is
/// independently lockable through its handle. There is no delete: state
/// lives for the whole run.
#[derive(Debug, Default)]
pub struct PaginationStateStore {
    states: RwLock<HashMap<String, EntityState>>,
}

impl PaginationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; the first call for an id installs the initial state.
    pub fn get_or_create(&self, entity_id: &str) -> Result<EntityState, ScrollError> {
        if entity_id.trim().is_empty() {
            return Err(ScrollError::InvalidEntity);
        }

        {
            let states = self.states.read().expect("state store lock poisoned");
            if let Some(state) = states.get(entity_id) {
                return Ok(state.clone());
            }
        }

        let mut states = self.states.write().expect("state store lock poisoned");
        Ok(states.entry(entity_id.to_string()).or_default().clone())
    }

    /// Full keyed map for the host's checkpoint collaborator.
    pub fn export(&self) -> HashMap<String, ScrollState> {
        let states = self.states.read().expect("state store lock poisoned");
        states
            .iter()
            .map(|(id, state)| (id.clone(), state.snapshot()))
            .collect()
    }

    /// Rehydrate from a checkpoint. Replaces any existing state, so the
    /// host calls this before handing entity ids to workers.
    pub fn hydrate(&self, checkpoint: HashMap<String, ScrollState>) {
        let mut states = self.states.write().expect("state store lock poisoned");
        *states = checkpoint
            .into_iter()
            .map(|(id, state)| (id, EntityState::new(state)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_installs_initial_state_once() {
        let store = PaginationStateStore::new();
        let state = store.get_or_create("post-1").unwrap();
        state.with(|s| {
            assert!(s.has_next_page);
            assert!(!s.reached_time_boundary);
            assert!(s.accepted_ids.is_empty());
            s.accepted_ids.insert("a".into());
        });

        // Second call returns the same state, not a fresh one.
        let again = store.get_or_create("post-1").unwrap();
        assert_eq!(again.accepted_count(), 1);
    }

    #[test]
    fn empty_entity_id_is_rejected() {
        let store = PaginationStateStore::new();
        assert!(matches!(
            store.get_or_create(""),
            Err(ScrollError::InvalidEntity)
        ));
        assert!(matches!(
            store.get_or_create("   "),
            Err(ScrollError::InvalidEntity)
        ));
    }

    #[test]
    fn has_next_page_merge_is_monotonic() {
        let mut state = ScrollState::default();
        state.merge_has_next_page(true);
        assert!(state.has_next_page);
        state.merge_has_next_page(false);
        assert!(!state.has_next_page);
        // A stale later `true` must not resurrect the stream.
        state.merge_has_next_page(true);
        assert!(!state.has_next_page);
    }

    #[test]
    fn export_hydrate_round_trips_accepted_ids() {
        let store = PaginationStateStore::new();
        let state = store.get_or_create("post-1").unwrap();
        state.with(|s| {
            s.accepted_ids.insert("a".into());
            s.accepted_ids.insert("b".into());
            s.merge_has_next_page(false);
        });

        let checkpoint = store.export();

        let restored = PaginationStateStore::new();
        restored.hydrate(checkpoint);
        let state = restored.get_or_create("post-1").unwrap();
        state.with(|s| {
            assert_eq!(s.accepted_ids.len(), 2);
            assert!(s.accepted_ids.contains("a"));
            assert!(!s.has_next_page);
        });
    }
}
