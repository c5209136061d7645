pub mod error;
pub mod options;
pub mod state;
pub mod stats;
pub mod types;

pub use error::ScrollError;
pub use options::RunOptions;
pub use state::{EntityState, PaginationStateStore, ScrollState};
pub use stats::ScrollStats;
pub use types::{
    EntityType, FeedKind, OutputRecord, RawPage, TimeWindow, TranslatedPage, FIRST_PAGE_MARKER,
};
