//! Ordering, timing, and failure contracts for series and parallel
//! composition.
//!
//! Timing assertions use a 50ms tick with generous upper bounds so they hold
//! on loaded CI machines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use taskmill::{
    parallel, series, task_fn, Registry, Reporter, RunnableTask, Runner, TaskError, TaskRef,
    TaskStatus,
};

const TICK: Duration = Duration::from_millis(50);

/// A leaf task that sleeps for one tick and counts its invocations.
fn slow_task(invocations: Arc<AtomicUsize>) -> RunnableTask<()> {
    task_fn(move || {
        let invocations = invocations.clone();
        async move {
            tokio::time::sleep(TICK).await;
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// A leaf task that fails immediately.
fn failing_task() -> RunnableTask<()> {
    task_fn(|| async { Err(TaskError::failed(anyhow::anyhow!("boom"))) })
}

fn runner() -> Runner<()> {
    Runner::new(Arc::new(Registry::new()))
}

#[tokio::test]
async fn series_runs_children_in_order_summing_durations() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let tagged = |tag: &'static str| -> TaskRef<()> {
        let order = order.clone();
        task_fn(move || {
            let order = order.clone();
            async move {
                tokio::time::sleep(TICK).await;
                order.lock().unwrap().push(tag);
                Ok(())
            }
        })
        .into()
    };

    let unit = series(vec![tagged("a"), tagged("b"), tagged("c")]);

    let start = Instant::now();
    runner().run(unit).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    assert!(
        elapsed >= TICK * 3,
        "series must sum child durations, took {elapsed:?}"
    );
}

#[tokio::test]
async fn parallel_overlaps_children() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<TaskRef<()>> = (0..4).map(|_| slow_task(invocations.clone()).into()).collect();

    let start = Instant::now();
    runner().run(parallel(tasks)).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert!(elapsed >= TICK);
    assert!(
        elapsed < TICK * 3,
        "parallel must overlap children, took {elapsed:?}"
    );
}

#[tokio::test]
async fn nested_combinators_compose_by_sum_and_max() {
    // parallel([leaf, series([leaf, leaf])]) completes in about two ticks:
    // max(1 tick, 1 tick + 1 tick).
    let invocations = Arc::new(AtomicUsize::new(0));
    let unit = parallel(vec![
        slow_task(invocations.clone()).into(),
        series(vec![
            slow_task(invocations.clone()).into(),
            slow_task(invocations.clone()).into(),
        ])
        .into(),
    ]);

    let start = Instant::now();
    runner().run(unit).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert!(elapsed >= TICK * 2);
    assert!(
        elapsed < TICK * 4,
        "nested tree should take about two ticks, took {elapsed:?}"
    );
}

#[tokio::test]
async fn run_fails_on_unknown_name() {
    let err = runner().run("missing").await.unwrap_err();
    assert!(matches!(err, TaskError::UnknownTask(name) if name == "missing"));
}

#[tokio::test]
async fn registered_task_runs_exactly_once() {
    let registry: Arc<Registry<()>> = Arc::new(Registry::new());
    let invocations = Arc::new(AtomicUsize::new(0));
    registry.register("job", slow_task(invocations.clone()));

    Runner::new(registry).run("job").await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn re_registration_replaces_the_earlier_entry() {
    let registry: Arc<Registry<()>> = Arc::new(Registry::new());
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    registry.register("job", slow_task(first.clone()));
    registry.register("job", slow_task(second.clone()));

    Runner::new(registry).run("job").await.unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn names_resolve_late() {
    // The combinator tree references "late" before it exists; registration
    // happens after construction but before the run.
    let registry: Arc<Registry<()>> = Arc::new(Registry::new());
    let unit = series(vec!["late".into()]);

    let invocations = Arc::new(AtomicUsize::new(0));
    registry.register("late", slow_task(invocations.clone()));

    Runner::new(registry).run(unit).await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn series_fails_fast() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let unit = series(vec![
        failing_task().into(),
        slow_task(invocations.clone()).into(),
    ]);

    let err = runner().run(unit).await.unwrap_err();
    assert!(matches!(err, TaskError::Other(_)));
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        0,
        "children after a failure must never start"
    );
}

#[tokio::test]
async fn parallel_settles_all_children_before_failing() {
    // One child fails immediately; a slow sibling still runs to completion
    // before the combinator reports the failure.
    let finished = Arc::new(AtomicUsize::new(0));
    let slow_success = {
        let finished = finished.clone();
        task_fn(move || {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(TICK * 2).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };

    let start = Instant::now();
    let err = runner()
        .run(parallel(vec![failing_task().into(), slow_success.into()]))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, TaskError::Other(_)));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert!(
        elapsed >= TICK * 2,
        "parallel must wait for every child to settle, took {elapsed:?}"
    );
}

#[tokio::test]
async fn parallel_aggregates_multiple_failures() {
    let err = runner()
        .run(parallel(vec![failing_task().into(), failing_task().into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Aggregate(errors) if errors.len() == 2));
}

#[tokio::test]
async fn parallel_resolves_eagerly_before_starting_any_child() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let unit = parallel(vec!["ghost".into(), slow_task(invocations.clone()).into()]);

    let err = runner().run(unit).await.unwrap_err();
    assert!(matches!(err, TaskError::UnknownTask(name) if name == "ghost"));
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        0,
        "an unknown name must fail the group before siblings start"
    );
}

/// Collects reporter events into a shared vec.
#[derive(Clone)]
struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Reporter for RecordingReporter {
    async fn task_started(&self, task: &str) {
        self.events.lock().unwrap().push(format!("start {task}"));
    }

    async fn task_finished(&self, task: &str, status: TaskStatus) {
        let outcome = match status {
            TaskStatus::Completed => "ok",
            TaskStatus::Failed { .. } => "err",
        };
        self.events.lock().unwrap().push(format!("{outcome} {task}"));
    }
}

#[tokio::test]
async fn reporter_sees_named_children_in_order() {
    let registry: Arc<Registry<()>> = Arc::new(Registry::new());
    registry.register("fmt", task_fn(|| async { Ok(()) }));
    registry.register("lint", task_fn(|| async { Ok(()) }));

    let events = Arc::new(Mutex::new(Vec::new()));
    let reporter = RecordingReporter {
        events: events.clone(),
    };
    let runner = Runner::new(registry).with_reporter(reporter);

    runner
        .run(series(vec!["fmt".into(), "lint".into()]))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "start <anonymous>", // the series unit itself
            "start fmt",
            "ok fmt",
            "start lint",
            "ok lint",
            "ok <anonymous>",
        ]
    );
}
