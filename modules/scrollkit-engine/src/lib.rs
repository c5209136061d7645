pub mod controller;
pub mod orchestrator;
pub mod project;
pub mod shutdown;
pub mod sink;
pub mod translate;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;


pub use controller::{LoopState, ScrollLoopController};
pub use project::project_batch;
pub use orchestrator::{LoadMoreOrchestrator, OrchestratorTiming};
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
pub use sink::{BatchOutcome, DeduplicatingItemSink};
pub use traits::{AutomationDriver, RecordSink, StateCheckpoint};
pub use translate::translate;
