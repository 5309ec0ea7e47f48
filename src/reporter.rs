//! Observability hooks for task execution.

use async_trait::async_trait;

/// Outcome of one task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task completed successfully.
    Completed,
    /// The task failed.
    Failed { error: String },
}

/// Receives an event for every task, combinator, and stage execution.
///
/// Hooks are awaited on the execution path, so implementations must be cheap
/// or internally buffered.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// A task is about to run. `task` is its registered name, or
    /// `"<anonymous>"` for units passed directly.
    async fn task_started(&self, task: &str);

    /// A task settled.
    async fn task_finished(&self, task: &str, status: TaskStatus);
}

/// A reporter that discards all events.
///
/// The default for [`Runner`](crate::Runner) and the scheduler.
#[derive(Debug, Clone, Default)]
pub struct NoopReporter;

impl NoopReporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for NoopReporter {
    async fn task_started(&self, _task: &str) {}

    async fn task_finished(&self, _task: &str, _status: TaskStatus) {}
}
