//! # Taskmill
//!
//! The embeddable build orchestrator.
//!
//! Named tasks, series/parallel composition, and immutable file pipelines
//! that run in your process. No infrastructure required.
//!
//! ## Why Taskmill?
//!
//! - **One task shape** - closures, registered names, combinators, and file
//!   pipeline stages all compose through the same runnable-unit type
//! - **Deterministic ordering** - `series` sequences strictly, `parallel`
//!   joins at a barrier; wall-clock is sum-of-children vs max-of-children
//! - **Immutable pipeline state** - snapshots share payload bytes and fan
//!   out safely across concurrent branches
//! - **Embeddable** - A library, not a service. Runs on your tokio runtime.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taskmill::{parallel, series, task_fn, Registry, Runner};
//!
//! let registry = Arc::new(Registry::new());
//! registry.register("clean", task_fn(|| async { /* ... */ Ok(()) }));
//! registry.register("lint", task_fn(|| async { /* ... */ Ok(()) }));
//! registry.register("compile", task_fn(|| async { /* ... */ Ok(()) }));
//! registry.register(
//!     "build",
//!     series(vec![
//!         "clean".into(),
//!         parallel(vec!["lint".into(), "compile".into()]).into(),
//!     ]),
//! );
//!
//! let runner = Runner::new(registry);
//! runner.run("build").await?;
//! ```
//!
//! Note `parallel(...)` converting straight into a task reference: combinator
//! results are ordinary runnable units, so trees nest to arbitrary depth.
//!
//! ## File pipelines
//!
//! Pipeline stages are tasks whose threaded value is a [`PipelineState`]:
//!
//! ```rust,ignore
//! use taskmill::{
//!     for_each_record, ingest, map_json, persist, select, series, PipelineState,
//! };
//!
//! let bundle = series(vec![
//!     ingest(["**/*.json"]).into(),
//!     select(["manifests/*.json"]).into(),
//!     for_each_record(map_json(|mut doc| {
//!         doc["generated"] = true.into();
//!         doc
//!     }))
//!     .into(),
//!     persist("dist").into(),
//! ]);
//!
//! runner.run_with(PipelineState::start_in("assets"), bundle).await?;
//! ```

pub mod combinators;
pub mod record;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod shell;
pub mod stages;
pub mod state;
pub mod task;

pub use combinators::{parallel, series, Merge};
pub use record::{map_json, rename, FileRecord, RecordTransform};
pub use reporter::{NoopReporter, Reporter, TaskStatus};
pub use runner::Runner;
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use shell::exec;
pub use stages::{for_each_record, ingest, persist, select};
pub use state::PipelineState;
pub use task::{
    stage_fn, task_fn, Registry, RunnableTask, TaskContext, TaskError, TaskFuture, TaskRef,
};
