//! The execution entry point.

use std::sync::Arc;

use tracing::debug;

use crate::reporter::{NoopReporter, Reporter};
use crate::task::{Registry, TaskContext, TaskError, TaskRef};

/// Executes task references against a registry.
///
/// The sole external entry point: invocation is immediate, there is no
/// separate start/await step, and the returned future completes with the
/// task tree's threaded value or its failure, unchanged.
pub struct Runner<S> {
    registry: Arc<Registry<S>>,
    reporter: Arc<dyn Reporter>,
}

impl<S> Runner<S>
where
    S: Send + 'static,
{
    /// Create a runner over `registry`, reporting to a [`NoopReporter`].
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self {
            registry,
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Replace the reporter.
    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// The registry this runner resolves names against.
    pub fn registry(&self) -> &Arc<Registry<S>> {
        &self.registry
    }

    /// Resolve and execute `task`, threading `seed` through the tree.
    pub async fn run_with(&self, seed: S, task: impl Into<TaskRef<S>>) -> Result<S, TaskError> {
        let task = task.into();
        debug!(task = task.label(), "run requested");
        let ctx = TaskContext::new(self.registry.clone(), self.reporter.clone(), seed);
        ctx.run(&task).await
    }
}

impl<S> Runner<S>
where
    S: Default + Send + 'static,
{
    /// Resolve and execute `task` with a default-constructed seed value.
    pub async fn run(&self, task: impl Into<TaskRef<S>>) -> Result<S, TaskError> {
        self.run_with(S::default(), task).await
    }
}
