use typed_builder::TypedBuilder;

use crate::types::TimeWindow;

/// Per-run configuration consumed by the engine. One `RunOptions` is
/// shared by every entity processed in a run.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct RunOptions {
    /// Cap on accepted records per entity. `None` means unbounded,
    /// `Some(0)` disables scrolling entirely.
    #[builder(default, setter(strip_option))]
    pub limit: Option<u64>,

    #[builder(default)]
    pub window: TimeWindow,
}

impl RunOptions {
    pub fn effective_limit(&self) -> u64 {
        self.limit.unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_limit_is_effectively_unbounded() {
        let options = RunOptions::builder().build();
        assert_eq!(options.effective_limit(), u64::MAX);
    }

    #[test]
    fn zero_limit_survives_builder() {
        let options = RunOptions::builder().limit(0).build();
        assert_eq!(options.effective_limit(), 0);
    }
}
