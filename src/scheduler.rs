//! Interval-based re-execution of tasks.
//!
//! The watch-style convenience for long-lived build processes: register a
//! task reference with an interval and the scheduler re-runs it forever. A
//! firing that fails is logged and swallowed; it must not stop the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info};

use crate::reporter::{NoopReporter, Reporter};
use crate::task::{Registry, TaskContext, TaskRef};

type SeedFn<S> = Arc<dyn Fn() -> S + Send + Sync>;

struct ScheduledJob<S> {
    task: TaskRef<S>,
    interval: Duration,
    run_on_start: bool,
    seed: SeedFn<S>,
}

/// Builder for a [`Scheduler`].
pub struct SchedulerBuilder<S> {
    registry: Arc<Registry<S>>,
    reporter: Arc<dyn Reporter>,
    jobs: Vec<ScheduledJob<S>>,
}

impl<S> SchedulerBuilder<S>
where
    S: Send + 'static,
{
    /// Create a builder whose jobs resolve names against `registry`.
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self {
            registry,
            reporter: Arc::new(NoopReporter),
            jobs: Vec::new(),
        }
    }

    /// Re-run `task` every `interval`, seeding each firing with a
    /// default-constructed value.
    pub fn job(self, task: impl Into<TaskRef<S>>, interval: Duration) -> Self
    where
        S: Default,
    {
        self.job_with_seed(task, interval, S::default)
    }

    /// Re-run `task` every `interval`, seeding each firing from `seed_fn`.
    pub fn job_with_seed(
        mut self,
        task: impl Into<TaskRef<S>>,
        interval: Duration,
        seed_fn: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        self.jobs.push(ScheduledJob {
            task: task.into(),
            interval,
            run_on_start: false,
            seed: Arc::new(seed_fn),
        });
        self
    }

    /// Set whether the most recently added job fires immediately on start.
    ///
    /// Must be called after `job`. Defaults to false.
    pub fn run_on_start(mut self, run: bool) -> Self {
        if let Some(job) = self.jobs.last_mut() {
            job.run_on_start = run;
        }
        self
    }

    /// Report scheduled executions to `reporter`.
    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Build the scheduler.
    pub fn build(self) -> Scheduler<S> {
        Scheduler {
            registry: self.registry,
            reporter: self.reporter,
            jobs: self.jobs,
        }
    }
}

/// Runs registered jobs at their intervals, indefinitely.
pub struct Scheduler<S> {
    registry: Arc<Registry<S>>,
    reporter: Arc<dyn Reporter>,
    jobs: Vec<ScheduledJob<S>>,
}

impl<S> Scheduler<S>
where
    S: Send + 'static,
{
    /// Run all jobs until the process exits.
    pub async fn run(&self) -> ! {
        let handles: Vec<_> = self
            .jobs
            .iter()
            .map(|job| {
                let registry = self.registry.clone();
                let reporter = self.reporter.clone();
                let task = job.task.clone();
                let interval_duration = job.interval;
                let seed = job.seed.clone();
                let run_on_start = job.run_on_start;

                tokio::spawn(async move {
                    Self::run_job(registry, reporter, task, interval_duration, seed, run_on_start)
                        .await
                })
            })
            .collect();

        // Keep handles in scope to maintain task references
        let _ = handles;

        // Wait forever (jobs run indefinitely)
        futures::future::pending::<()>().await;
        unreachable!()
    }

    async fn run_job(
        registry: Arc<Registry<S>>,
        reporter: Arc<dyn Reporter>,
        task: TaskRef<S>,
        interval_duration: Duration,
        seed: SeedFn<S>,
        run_on_start: bool,
    ) {
        info!(
            task = task.label(),
            interval_secs = interval_duration.as_secs(),
            run_on_start,
            "starting scheduled job"
        );

        if run_on_start {
            Self::fire(&registry, &reporter, &task, &seed).await;
        }

        let mut ticker = interval(interval_duration);
        ticker.tick().await; // Consume immediate first tick

        loop {
            ticker.tick().await;
            Self::fire(&registry, &reporter, &task, &seed).await;
        }
    }

    async fn fire(
        registry: &Arc<Registry<S>>,
        reporter: &Arc<dyn Reporter>,
        task: &TaskRef<S>,
        seed: &SeedFn<S>,
    ) {
        debug!(task = task.label(), "scheduled firing");
        let ctx = TaskContext::new(registry.clone(), reporter.clone(), seed());
        if let Err(e) = ctx.run(task).await {
            error!(task = task.label(), error = %e, "scheduled task failed");
        }
    }
}
