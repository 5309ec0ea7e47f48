//! Series and parallel composition of task references.
//!
//! Both combinators produce an ordinary [`RunnableTask`], so they are closed
//! under composition: a parallel group may contain a series sub-unit and vice
//! versa, to arbitrary depth. Wall-clock for a nested tree is the sum of
//! children for `series` and the maximum of children for `parallel`.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::task::{RunnableTask, TaskContext, TaskError, TaskRef};

/// Fan-in policy for the outputs of concurrent branches.
///
/// [`parallel`] folds its children's outputs left to right with this trait.
/// The unit payload merges trivially; [`PipelineState`](crate::PipelineState)
/// merges last-write-wins by record path.
pub trait Merge {
    fn merge(self, later: Self) -> Self;
}

impl Merge for () {
    fn merge(self, _later: Self) -> Self {}
}

/// Compose task references into one unit that runs them strictly in order.
///
/// The threaded value flows from each child's output into the next child's
/// input. Each reference is resolved immediately before its turn, so a name
/// registered mid-run (even by an earlier sibling) is honored. Fail-fast:
/// the first failure aborts the series and later children are never resolved
/// or started.
pub fn series<S>(tasks: Vec<TaskRef<S>>) -> RunnableTask<S>
where
    S: Send + 'static,
{
    Arc::new(move |ctx: TaskContext<S>| {
        let tasks = tasks.clone();
        Box::pin(async move {
            let registry = ctx.registry.clone();
            let reporter = ctx.reporter.clone();
            let mut value = ctx.into_value();
            for task in &tasks {
                let child = TaskContext::new(registry.clone(), reporter.clone(), value);
                value = child.run(task).await?;
            }
            Ok(value)
        })
    })
}

/// Compose task references into one unit that runs them concurrently.
///
/// Every reference is resolved up front, so an unknown name fails the whole
/// group before any child starts. Each child then receives a clone of the
/// input value and all children are driven as one joined set, interleaved at
/// their suspension points. The combinator completes only once every child
/// has settled. Fail-together: failures surface after the join — the lone
/// error when one child failed, [`TaskError::Aggregate`] when several did.
/// On success the children's outputs are merged left to right in list order
/// via [`Merge`], so on conflict a later child wins.
pub fn parallel<S>(tasks: Vec<TaskRef<S>>) -> RunnableTask<S>
where
    S: Merge + Clone + Send + 'static,
{
    Arc::new(move |ctx: TaskContext<S>| {
        let tasks = tasks.clone();
        Box::pin(async move {
            if tasks.is_empty() {
                return Ok(ctx.into_value());
            }

            let units = tasks
                .iter()
                .map(|task| {
                    let label = task.label().to_string();
                    ctx.registry.resolve(task).map(|unit| (unit, label))
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!(children = units.len(), "starting parallel group");

            let branches = units.into_iter().map(|(unit, label)| {
                let child = ctx.with_value(ctx.value().clone());
                child.run_resolved(unit, label)
            });
            let settled = join_all(branches).await;

            let mut outputs = Vec::with_capacity(settled.len());
            let mut failures = Vec::new();
            for result in settled {
                match result {
                    Ok(value) => outputs.push(value),
                    Err(e) => failures.push(e),
                }
            }
            if !failures.is_empty() {
                return Err(TaskError::collapse(failures));
            }

            let mut outputs = outputs.into_iter();
            let mut merged = match outputs.next() {
                Some(first) => first,
                None => return Ok(ctx.into_value()),
            };
            for output in outputs {
                merged = merged.merge(output);
            }
            Ok(merged)
        })
    })
}
