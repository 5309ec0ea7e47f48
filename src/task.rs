//! Task references, the registry, and the runnable-unit shape.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;

use crate::reporter::{Reporter, TaskStatus};

/// Error surfaced to the caller of [`Runner::run`](crate::Runner::run).
///
/// No failure is recovered inside the core: whatever a task, combinator, or
/// stage raises propagates to the original caller unchanged.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A named reference had no registry entry at resolution time.
    #[error("no task registered under the name {0:?}")]
    UnknownTask(String),

    /// An underlying read, write, or directory walk failed.
    #[error("i/o failure on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A glob pattern did not compile.
    #[error("invalid glob pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A record's payload was not valid JSON.
    #[error("failed to decode {path} as JSON")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A rewritten document could not be re-encoded.
    #[error("failed to re-encode {path}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// An external command could not be spawned.
    #[error("failed to spawn {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command exited with a non-zero status.
    #[error("command {command:?} exited with {status}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// Several concurrent units failed together.
    #[error("{} concurrent tasks failed", .0.len())]
    Aggregate(Vec<TaskError>),

    /// An ad-hoc failure raised inside a task body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Wrap an ad-hoc failure raised inside a task body.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Other(err.into())
    }

    /// Collapse the failures of a settled concurrent batch into one error.
    ///
    /// A lone failure propagates unchanged; several become an aggregate so
    /// that none is silently dropped. Callers guarantee `errors` is nonempty.
    pub(crate) fn collapse(mut errors: Vec<TaskError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Aggregate(errors)
        }
    }
}

/// The future produced by one task invocation.
pub type TaskFuture<S> = BoxFuture<'static, Result<S, TaskError>>;

/// A runnable unit of work.
///
/// Invoked with an execution context carrying the value threaded through the
/// task tree; resolves to the (possibly transformed) value or a failure.
/// Plain tasks pass the value through untouched; pipeline stages transform a
/// [`PipelineState`](crate::PipelineState).
pub type RunnableTask<S> = Arc<dyn Fn(TaskContext<S>) -> TaskFuture<S> + Send + Sync>;

/// A reference to a task: either the unit itself or a registered name.
///
/// Names are resolved late, at execution time, so a name may be registered
/// after a combinator tree referencing it has been built — it only has to
/// exist once the reference actually runs.
pub enum TaskRef<S> {
    /// A unit of work passed directly.
    Callable(RunnableTask<S>),
    /// The name of a unit registered in a [`Registry`].
    Named(String),
}

impl<S> Clone for TaskRef<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Callable(task) => Self::Callable(task.clone()),
            Self::Named(name) => Self::Named(name.clone()),
        }
    }
}

impl<S> TaskRef<S> {
    /// Display label used in logs and reporter events.
    pub fn label(&self) -> &str {
        match self {
            Self::Callable(_) => "<anonymous>",
            Self::Named(name) => name,
        }
    }
}

impl<S> From<&str> for TaskRef<S> {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl<S> From<String> for TaskRef<S> {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl<S> From<RunnableTask<S>> for TaskRef<S> {
    fn from(task: RunnableTask<S>) -> Self {
        Self::Callable(task)
    }
}

/// Mapping from task name to runnable unit.
///
/// An explicit object rather than process-global state: tests and embedders
/// hold as many independent registries as they need, each with its own
/// lifetime. Registration is last-write-wins and there is no removal.
pub struct Registry<S> {
    tasks: RwLock<HashMap<String, RunnableTask<S>>>,
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Store `task` under `name`, silently replacing any earlier entry.
    pub fn register(&self, name: impl Into<String>, task: RunnableTask<S>) {
        let name = name.into();
        debug!(task = %name, "registering task");
        self.tasks
            .write()
            .expect("registry lock poisoned")
            .insert(name, task);
    }

    /// Whether a task is currently registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Normalize a reference into a runnable unit.
    ///
    /// Performed freshly before every execution of the reference — results
    /// are never cached, so a re-registration between two occurrences of a
    /// name is observed by the later occurrence.
    pub fn resolve(&self, task: &TaskRef<S>) -> Result<RunnableTask<S>, TaskError> {
        match task {
            TaskRef::Callable(unit) => Ok(unit.clone()),
            TaskRef::Named(name) => self
                .tasks
                .read()
                .expect("registry lock poisoned")
                .get(name)
                .cloned()
                .ok_or_else(|| TaskError::UnknownTask(name.clone())),
        }
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-invocation execution context.
///
/// Carries the registry used for late name resolution, the reporter, and the
/// value threaded through the task tree. Combinators derive child contexts
/// from their own; every execution funnels through [`TaskContext::run`].
pub struct TaskContext<S> {
    pub(crate) registry: Arc<Registry<S>>,
    pub(crate) reporter: Arc<dyn Reporter>,
    pub(crate) value: S,
}

impl<S> TaskContext<S> {
    pub(crate) fn new(registry: Arc<Registry<S>>, reporter: Arc<dyn Reporter>, value: S) -> Self {
        Self {
            registry,
            reporter,
            value,
        }
    }

    /// The threaded value.
    pub fn value(&self) -> &S {
        &self.value
    }

    /// The threaded value, consuming the context.
    pub fn into_value(self) -> S {
        self.value
    }

    /// A sibling context carrying `value` instead.
    pub(crate) fn with_value(&self, value: S) -> Self {
        Self {
            registry: self.registry.clone(),
            reporter: self.reporter.clone(),
            value,
        }
    }
}

impl<S> TaskContext<S>
where
    S: Send + 'static,
{
    /// Resolve `task` and execute it with this context's value.
    pub async fn run(self, task: &TaskRef<S>) -> Result<S, TaskError> {
        let unit = self.registry.resolve(task)?;
        let label = task.label().to_string();
        self.run_resolved(unit, label).await
    }

    /// Execute an already-resolved unit, bracketing it with reporter events.
    pub(crate) async fn run_resolved(
        self,
        unit: RunnableTask<S>,
        label: String,
    ) -> Result<S, TaskError> {
        let reporter = self.reporter.clone();
        reporter.task_started(&label).await;
        match unit(self).await {
            Ok(value) => {
                reporter.task_finished(&label, TaskStatus::Completed).await;
                Ok(value)
            }
            Err(e) => {
                reporter
                    .task_finished(
                        &label,
                        TaskStatus::Failed {
                            error: e.to_string(),
                        },
                    )
                    .await;
                Err(e)
            }
        }
    }
}

/// Lift a zero-argument async operation into a runnable unit.
///
/// The threaded value passes through unchanged; the closure is invoked once
/// per execution of the unit.
pub fn task_fn<S, F, Fut>(f: F) -> RunnableTask<S>
where
    S: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move |ctx: TaskContext<S>| {
        let fut = f();
        Box::pin(async move {
            fut.await?;
            Ok(ctx.into_value())
        })
    })
}

/// Lift a value transform into a runnable unit — the pipeline-stage shape.
pub fn stage_fn<S, F, Fut>(f: F) -> RunnableTask<S>
where
    S: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, TaskError>> + Send + 'static,
{
    Arc::new(move |ctx: TaskContext<S>| Box::pin(f(ctx.into_value())))
}
