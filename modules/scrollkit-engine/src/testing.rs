// Test mocks for the scroll engine.
//
// Three mocks matching the three trait boundaries:
// - MockDriver (AutomationDriver) — scripted trigger/request/response sequences
// - MemorySink (RecordSink) — captures emitted records, optional failure injection
// - MemoryCheckpoint (StateCheckpoint) — in-memory scroll-state map
//
// Plus helpers for building comment pages and sink-ready records.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use scrollkit_core::{OutputRecord, RawPage, ScrollState};

use crate::traits::{AutomationDriver, RecordSink, StateCheckpoint};

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DriverScript {
    triggers: VecDeque<bool>,
    request_waits: VecDeque<bool>,
    responses: VecDeque<Option<RawPage>>,
    unusable: bool,
    trigger_calls: u32,
    request_wait_calls: u32,
    response_wait_calls: u32,
}

/// Scripted automation driver. Queues are consumed front-to-back;
/// an exhausted trigger/request queue defaults to `true`, an exhausted
/// response queue to `None` (correlation timeout).
pub struct MockDriver {
    script: Mutex<DriverScript>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(DriverScript::default()),
        }
    }

    pub fn with_pages(pages: Vec<RawPage>) -> Self {
        let driver = Self::new();
        {
            let mut script = driver.script.lock().unwrap();
            script.responses = pages.into_iter().map(Some).collect();
        }
        driver
    }

    pub fn on_trigger(self, results: &[bool]) -> Self {
        self.script.lock().unwrap().triggers.extend(results.iter().copied());
        self
    }

    pub fn on_request_wait(self, results: &[bool]) -> Self {
        self
            .script
            .lock()
            .unwrap()
            .request_waits
            .extend(results.iter().copied());
        self
    }

    pub fn on_response(self, response: Option<RawPage>) -> Self {
        self.script.lock().unwrap().responses.push_back(response);
        self
    }

    pub fn page_unusable(self) -> Self {
        self.script.lock().unwrap().unusable = true;
        self
    }

    pub fn trigger_calls(&self) -> u32 {
        self.script.lock().unwrap().trigger_calls
    }

    pub fn request_waits(&self) -> u32 {
        self.script.lock().unwrap().request_wait_calls
    }

    pub fn response_waits(&self) -> u32 {
        self.script.lock().unwrap().response_wait_calls
    }
}

#[async_trait]
impl AutomationDriver for MockDriver {
    async fn trigger_action(&self, _entity_id: &str) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        script.trigger_calls += 1;
        Ok(script.triggers.pop_front().unwrap_or(true))
    }

    async fn wait_for_matching_request(&self, _entity_id: &str, _timeout: Duration) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        script.request_wait_calls += 1;
        Ok(script.request_waits.pop_front().unwrap_or(true))
    }

    async fn wait_for_matching_response(
        &self,
        _entity_id: &str,
        _timeout: Duration,
    ) -> Result<Option<RawPage>> {
        let mut script = self.script.lock().unwrap();
        script.response_wait_calls += 1;
        Ok(script.responses.pop_front().unwrap_or(None))
    }

    async fn is_page_usable(&self) -> bool {
        !self.script.lock().unwrap().unusable
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Captures every emitted record in order. `failing_on` makes emission of
/// a specific id fail, for crash-path tests.
pub struct MemorySink {
    records: Mutex<Vec<OutputRecord>>,
    failing: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn emitted(&self) -> Vec<OutputRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn emitted_ids(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|record| record.id.clone())
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, record: &OutputRecord) -> Result<()> {
        if let Some(id) = record.id.as_deref() {
            if self.failing.contains(id) {
                bail!("MemorySink: emission of {id} set to fail");
            }
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCheckpoint
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCheckpoint {
    saved: Mutex<Option<HashMap<String, ScrollState>>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateCheckpoint for MemoryCheckpoint {
    async fn load(&self) -> Result<Option<HashMap<String, ScrollState>>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, states: &HashMap<String, ScrollState>) -> Result<()> {
        *self.saved.lock().unwrap() = Some(states.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

/// Comment page with `has_next_page: true`. `ids` are in chronological
/// order; edges are stored newest-first the way the remote serves them,
/// so translation reverses them back.
pub fn comment_page(ids: &[&str], base_ts: i64) -> RawPage {
    comment_page_with(ids, base_ts, true)
}

/// Comment page signalling the end of the stream.
pub fn final_comment_page(ids: &[&str], base_ts: i64) -> RawPage {
    comment_page_with(ids, base_ts, false)
}

fn comment_page_with(ids: &[&str], base_ts: i64, has_next_page: bool) -> RawPage {
    let mut edges: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            json!({ "node": {
                "id": id,
                "text": format!("comment {id}"),
                "created_at": base_ts + index as i64 * 10,
            }})
        })
        .collect();
    edges.reverse();

    RawPage::new(
        "https://example.com/graphql/query/?query_hash=x&variables=%7B%22shortcode%22%3A%22y%22%2C%22first%22%3A12%7D",
        json!({
            "shortcode_media": {
                "edge_media_to_parent_comment": {
                    "count": ids.len(),
                    "page_info": { "has_next_page": has_next_page, "end_cursor": "cursor" },
                    "edges": edges,
                }
            }
        }),
    )
}

/// Sink-ready record with no timestamp.
pub fn record(id: &str) -> OutputRecord {
    OutputRecord {
        id: Some(id.to_string()),
        timestamp: None,
        position: 0,
        payload: json!({ "id": id }),
    }
}

/// Sink-ready record timestamped at `secs` unix seconds.
pub fn record_at(id: &str, secs: i64) -> OutputRecord {
    OutputRecord {
        timestamp: Utc.timestamp_opt(secs, 0).single(),
        ..record(id)
    }
}
