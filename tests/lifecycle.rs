//! Start/stop sequencing, rollback, deadlines and the run loop.

use std::sync::Arc;
use std::time::Duration;

use service_kernel::config::LifecycleConfig;
use service_kernel::kernel::{HookError, StartError};
use service_kernel::lifecycle::{HookPhase, LifecycleState, Shutdown};
use service_kernel::{AppBuilder, Hook, KernelError};

mod common;

use common::Journal;

struct A;
struct B;
struct C;
struct Trigger;

const TIMEOUT: Duration = Duration::from_secs(1);

/// A <- B <- C, each recording its hooks. Components named in `fail_start`
/// or `fail_stop` fail that phase.
fn chain(journal: &Journal, fail_start: &[&'static str], fail_stop: &[&'static str]) -> AppBuilder {
    let app = AppBuilder::new();
    let hook = |name: &'static str| {
        journal.hook_with(
            name,
            fail_start.contains(&name).then_some("boom"),
            fail_stop.contains(&name).then_some("stuck"),
        )
    };

    let (ha, hb, hc) = (hook("A"), hook("B"), hook("C"));
    // Registered out of dependency order on purpose.
    app.provide(move |(_b,): (Arc<B>,), lifecycle| {
        lifecycle.append(hc);
        Ok(C)
    })
    .unwrap();
    app.provide(move |(), lifecycle| {
        lifecycle.append(ha);
        Ok(A)
    })
    .unwrap();
    app.provide(move |(_a,): (Arc<A>,), lifecycle| {
        lifecycle.append(hb);
        Ok(B)
    })
    .unwrap();
    app
}

#[tokio::test]
async fn stop_reverses_start_order() {
    let journal = Journal::new();
    let mut app = chain(&journal, &[], &[]).resolve().unwrap();

    app.start(TIMEOUT).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Running);
    app.stop(TIMEOUT).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Stopped);

    assert_eq!(
        journal.entries(),
        vec!["start A", "start B", "start C", "stop C", "stop B", "stop A"]
    );
}

#[tokio::test]
async fn failing_dependency_never_starts_its_dependent() {
    let journal = Journal::new();
    let mut app = chain(&journal, &["A"], &[]).resolve().unwrap();

    let err = app.start(TIMEOUT).await.unwrap_err();
    match &err {
        KernelError::Start(StartError { component, source }) => {
            assert!(component.ends_with("::A"));
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("boom"));
    assert_eq!(journal.entries(), vec!["start A"]);
    assert_eq!(app.state(), LifecycleState::StartFailed);
}

#[tokio::test]
async fn rollback_stops_exactly_the_started_prefix_in_reverse() {
    let journal = Journal::new();
    let mut app = chain(&journal, &["C"], &[]).resolve().unwrap();

    let err = app.start(TIMEOUT).await.unwrap_err();
    assert!(matches!(err, KernelError::Start(ref e) if e.component.ends_with("::C")));
    assert_eq!(
        journal.entries(),
        vec!["start A", "start B", "start C", "stop B", "stop A"]
    );

    // Nothing is running any more; stop has nothing to do.
    app.stop(TIMEOUT).await.unwrap();
    assert_eq!(journal.entries().len(), 5);
}

#[tokio::test]
async fn stop_runs_every_hook_and_aggregates_failures() {
    let journal = Journal::new();
    let mut app = chain(&journal, &[], &["C", "A"]).resolve().unwrap();
    app.start(TIMEOUT).await.unwrap();

    match app.stop(TIMEOUT).await.unwrap_err() {
        KernelError::Stop(stop) => {
            let failed = stop.components();
            assert_eq!(failed.len(), 2);
            assert!(failed[0].ends_with("::C"));
            assert!(failed[1].ends_with("::A"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        journal.entries()[3..],
        ["stop C", "stop B", "stop A"].map(String::from)
    );
    assert_eq!(app.state(), LifecycleState::StopFailed);
}

#[tokio::test]
async fn second_stop_is_a_no_op() {
    let journal = Journal::new();
    let mut app = chain(&journal, &[], &[]).resolve().unwrap();
    app.start(TIMEOUT).await.unwrap();
    app.stop(TIMEOUT).await.unwrap();
    let after_first = journal.entries();

    app.stop(TIMEOUT).await.unwrap();
    assert_eq!(journal.entries(), after_first);
}

#[tokio::test]
async fn start_is_only_allowed_once() {
    let journal = Journal::new();
    let mut app = chain(&journal, &[], &[]).resolve().unwrap();
    app.start(TIMEOUT).await.unwrap();
    app.stop(TIMEOUT).await.unwrap();

    assert!(matches!(
        app.start(TIMEOUT).await.unwrap_err(),
        KernelError::InvalidState { operation: "start", state: LifecycleState::Stopped }
    ));
}

#[tokio::test(start_paused = true)]
async fn hook_past_the_deadline_fails_start_and_is_rolled_back() {
    let journal = Journal::new();
    let app = AppBuilder::new();
    let first = journal.hook("fast");
    app.provide(move |(), lifecycle| {
        lifecycle.append(first);
        Ok(A)
    })
    .unwrap();
    let slow = journal.clone();
    app.provide(move |(_a,): (Arc<A>,), lifecycle| {
        lifecycle.append(Hook::new().on_start(move |ctx| async move {
            slow.push("start slow");
            assert_eq!(ctx.phase(), HookPhase::Start);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
        Ok(B)
    })
    .unwrap();

    let mut app = app.resolve().unwrap();
    match app.start(Duration::from_secs(2)).await.unwrap_err() {
        KernelError::Start(StartError {
            component,
            source: HookError::DeadlineExceeded(exceeded),
        }) => {
            assert!(component.ends_with("::B"));
            assert_eq!(exceeded.timeout, Duration::from_secs(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(journal.entries(), vec!["start fast", "start slow", "stop fast"]);
}

#[tokio::test(start_paused = true)]
async fn stop_hook_past_the_deadline_is_reported_and_earlier_hooks_still_stop() {
    let journal = Journal::new();
    let app = AppBuilder::new();
    let first = journal.hook("A");
    app.provide(move |(), lifecycle| {
        lifecycle.append(first);
        Ok(A)
    })
    .unwrap();
    let slow = journal.clone();
    app.provide(move |(_a,): (Arc<A>,), lifecycle| {
        lifecycle.append(Hook::new().on_stop(move |ctx| async move {
            slow.push("stop slow");
            assert_eq!(ctx.phase(), HookPhase::Stop);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
        Ok(B)
    })
    .unwrap();

    let mut app = app.resolve().unwrap();
    app.start(TIMEOUT).await.unwrap();
    let stop = match app.stop(Duration::from_secs(2)).await.unwrap_err() {
        KernelError::Stop(stop) => stop,
        other => panic!("unexpected error: {other}"),
    };

    let slow = stop
        .failures
        .iter()
        .find(|failure| failure.component.ends_with("::B"))
        .expect("slow component reported");
    match &slow.error {
        HookError::DeadlineExceeded(exceeded) => {
            assert_eq!(exceeded.phase, HookPhase::Stop);
            assert_eq!(exceeded.timeout, Duration::from_secs(2));
        }
        other => panic!("unexpected hook error: {other}"),
    }
    assert_eq!(journal.entries(), vec!["start A", "stop slow", "stop A"]);
    assert_eq!(app.state(), LifecycleState::StopFailed);
}

#[tokio::test]
async fn constructor_failure_aborts_resolve_without_hooks() {
    let journal = Journal::new();
    let app = AppBuilder::new();
    let hook = journal.hook("A");
    app.provide(move |(), lifecycle| {
        lifecycle.append(hook);
        Ok(A)
    })
    .unwrap();
    app.provide(|(_a,): (Arc<A>,), _| -> Result<B, _> { Err("no database".into()) })
        .unwrap();

    match app.resolve().unwrap_err() {
        KernelError::Constructor { component, source } => {
            assert!(component.ends_with("::B"));
            assert_eq!(source.to_string(), "no database");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn run_stops_in_reverse_after_programmatic_shutdown() {
    let journal = Journal::new();
    let app = AppBuilder::with_lifecycle(LifecycleConfig {
        start_timeout_ms: 1_000,
        stop_timeout_ms: 1_000,
    });
    let (ha, hb) = (journal.hook("A"), journal.hook("B"));
    app.provide(move |(), lifecycle| {
        lifecycle.append(ha);
        Ok(A)
    })
    .unwrap();
    // B asks for shutdown as soon as it is running.
    app.provide(move |(_a, shutdown): (Arc<A>, Arc<Shutdown>), lifecycle| {
        lifecycle.append(hb);
        lifecycle.append(Hook::new().on_start(move |_| async move {
            shutdown.trigger();
            Ok(())
        }));
        Ok(B)
    })
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run returns after shutdown")
        .unwrap();
    assert_eq!(
        journal.entries(),
        vec!["start A", "start B", "stop B", "stop A"]
    );
}

#[tokio::test]
async fn run_reports_stop_failures() {
    let journal = Journal::new();
    let app = chain(&journal, &[], &["B"]);
    app.provide(|(_c, shutdown): (Arc<C>, Arc<Shutdown>), lifecycle| {
        lifecycle.append(Hook::new().on_start(move |_| async move {
            shutdown.trigger();
            Ok(())
        }));
        Ok(Trigger)
    })
    .unwrap();

    let err = app.run().await.unwrap_err();
    assert!(matches!(err, KernelError::Stop(ref stop) if stop.failures.len() == 1));
}
