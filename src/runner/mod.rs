pub mod budget;
pub mod classify;
pub mod orchestrator;
pub mod poller;
pub mod spec;

// Re-export commonly used types
pub use budget::{AttemptMode, RetryBudget};
pub use classify::{Classification, FailureClassifier, DEFAULT_SETTLE_DELAY};
pub use orchestrator::{Outcome, RunError, Runner};
pub use poller::OperationPoller;
pub use spec::JobSpec;
