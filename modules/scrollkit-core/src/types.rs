//! Shared data shapes for the scroll engine.
//!
//! `RawPage` is the untranslated remote response; `TranslatedPage` is the
//! uniform `{items, has_next_page, total_count}` projection every entity
//! type is normalized into; `OutputRecord` is the sink-ready item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker present in the query string of a "first page size" pagination
/// call. Distinguishes page-load responses from incidental background
/// traffic on the same page.
pub const FIRST_PAGE_MARKER: &str = "%22first%22";

/// Which edge collection a post feed paginates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    Profile,
    Hashtag,
    Location,
}

/// Closed set of paginated stream kinds. Adding one is a compile-time
/// extension point: the translator matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Comments,
    Posts(FeedKind),
    Followers,
    Following,
    Likers,
}

impl EntityType {
    /// Query-string substring identifying this type's paginated query.
    /// Combined with [`FIRST_PAGE_MARKER`] it correlates a UI trigger
    /// with the response it actually caused.
    pub fn query_fingerprint(self) -> &'static str {
        match self {
            EntityType::Comments => "%22shortcode%22",
            EntityType::Posts(FeedKind::Profile) => "%22id%22",
            EntityType::Posts(FeedKind::Hashtag) => "%22tag_name%22",
            EntityType::Posts(FeedKind::Location) => "%22location_id%22",
            EntityType::Followers | EntityType::Following | EntityType::Likers => {
                "%22include_reel%22"
            }
        }
    }

    /// Comment-style streams load older pages through an explicit button,
    /// so a missing trigger means the stream is exhausted. Post feeds also
    /// load through plain scrolling, so a missing button there proves
    /// nothing.
    pub fn trigger_absence_is_terminal(self) -> bool {
        !matches!(self, EntityType::Posts(_))
    }
}

/// Untranslated remote response: opaque payload plus the URL it was
/// served from, enough for the translator to find the right substructure
/// and for log lines to stay attributable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub payload: Value,
}

impl RawPage {
    pub fn new(url: impl Into<String>, payload: Value) -> Self {
        Self {
            url: url.into(),
            payload,
        }
    }
}

/// Uniform projection of one remote page.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedPage {
    /// Entity-type-specific ordering: comments are chronological (reversed
    /// at translation time), post feeds keep remote order.
    pub items: Vec<Value>,
    pub has_next_page: bool,
    pub total_count: Option<u64>,
}

impl TranslatedPage {
    /// An empty page that also signals the stream is over. Used when the
    /// expected collection is gone from the response.
    pub fn terminal() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            total_count: None,
        }
    }
}

/// Parsed, sink-ready projection of one raw item. A missing `id` makes
/// the whole batch undeduplicatable and is rejected by the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// 1-based position within the overall stream for this entity.
    pub position: u64,
    pub payload: Value,
}

/// Optional date bounds on accepted records, inclusive on both ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn is_unbounded(&self) -> bool {
        self.min_date.is_none() && self.max_date.is_none()
    }

    /// `min_date <= ts <= max_date`, with a missing bound leaving that
    /// side open.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(min) = self.min_date {
            if ts < min {
                return false;
            }
        }
        if let Some(max) = self.max_date {
            if ts > max {
                return false;
            }
        }
        true
    }

    /// Window check for a record. A record without a timestamp passes only
    /// when no window is configured: with a bound set there is no way to
    /// honor it for an undated record.
    pub fn admits(&self, ts: Option<DateTime<Utc>>) -> bool {
        match ts {
            Some(ts) => self.contains(ts),
            None => self.is_unbounded(),
        }
    }
}
