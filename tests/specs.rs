// SPDX-License-Identifier: MIT

//! Workspace-level end-to-end tests (§8): drives a `RunCoordinator` wired up
//! from fakes at every collaborator boundary (store is the real filesystem
//! implementation against a tempdir; sandbox, work store, and agent driver
//! are the crates' own test doubles) through the six scenarios the spec
//! calls out, plus a couple of the testable properties from §8's table.

use aro_core::{ExecutorMode, FakeClock, RunConfig, RunId, RunReason, RunStatus, SequentialIdGen};
use aro_coordinator::{
    AgentSettings, AutomationSettings, DriverRegistry, FakeWorkStore, ProjectSettings, RunCoordinator, Sprint, SprintTask,
};
use aro_drivers::{FakeAgentDriver, ScriptedResult};
use aro_sandbox::{FakeRepositoryAdapter, SandboxManager};
use aro_store::{FsRunStore, FsRunStoreIo, RunPatch, RunStore};
use std::sync::Arc;
use std::time::Duration;

fn project_settings(repo_root: std::path::PathBuf, max_iterations: Option<u32>) -> ProjectSettings {
    ProjectSettings {
        repo_root,
        automation: AutomationSettings {
            setup: vec![],
            max_iterations,
            agent: AgentSettings {
                name: "claude".to_string(),
                model: None,
                permission_mode: None,
                extra_args: vec![],
            },
            coding_style: None,
        },
    }
}

fn sprint() -> Sprint {
    Sprint {
        id: "sprint-1".to_string(),
        name: "Sprint One".to_string(),
        status: "active".to_string(),
        tasks: vec![
            SprintTask { id: "t1".to_string(), title: "first task".to_string() },
            SprintTask { id: "t2".to_string(), title: "second task".to_string() },
        ],
    }
}

/// Builds a coordinator wired up the way `aro`'s `build_app` does, except
/// every collaborator but the store is a fake and the driver's script is
/// caller-supplied so each scenario can shape the run's outcome.
async fn harness(
    dir: &std::path::Path,
    max_iterations: Option<u32>,
    script: Vec<ScriptedResult>,
) -> (RunCoordinator<FakeClock, SequentialIdGen>, Arc<dyn RunStore>, Arc<DriverRegistry>) {
    let clock = FakeClock::new();
    let store: Arc<dyn RunStore> = Arc::new(FsRunStore::new(dir.join("runs"), FsRunStoreIo, clock.clone()));
    let repo = Arc::new(FakeRepositoryAdapter::new("main"));
    let sandbox = Arc::new(SandboxManager::new(repo));
    let work_store: Arc<dyn aro_coordinator::WorkStore> = Arc::new(
        FakeWorkStore::new()
            .with_sprint("proj", sprint())
            .with_settings("proj", project_settings(dir.to_path_buf(), max_iterations)),
    );
    let drivers = Arc::new(DriverRegistry::new());
    drivers.register("claude", Arc::new(FakeAgentDriver::new("claude", script)));

    let coordinator =
        RunCoordinator::new(store.clone(), sandbox, work_store, drivers.clone(), clock, SequentialIdGen::new("run"), 4);
    (coordinator, store, drivers)
}

async fn run_to_terminal(store: &Arc<dyn RunStore>, run_id: &RunId) -> aro_core::RunRecord {
    for _ in 0..200 {
        let record = store.get(run_id).await.expect("get run");
        if record.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not reach a terminal state in time");
}

/// §8 scenario 1: happy path, single iteration — the agent emits the
/// completion promise on its first invocation.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn happy_path_single_iteration_completes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(5), vec![ScriptedResult::completed()]).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    let record = run_to_terminal(&store, &run_id).await;

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.reason, Some(RunReason::Completed));
    assert_eq!(record.current_iteration, 1);
}

/// §8 scenario 2: iteration cap — the agent never emits the completion
/// promise, so the run stops once it hits `max_iterations`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn iteration_cap_stops_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(3), vec![ScriptedResult::progress("still working")]).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    let record = run_to_terminal(&store, &run_id).await;

    assert_eq!(record.status, RunStatus::Stopped);
    assert_eq!(record.reason, Some(RunReason::MaxIterations));
    assert_eq!(record.current_iteration, 3);
}

/// §8 scenario 3: cooperative cancellation mid-iteration — `cancelRun` sets
/// the store flag; the engine observes it at the next iteration boundary
/// (I7: bounded, not instantaneous) and the final record always carries the
/// Canceled status/reason pair regardless of exactly which boundary caught it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_cancellation_mid_run_ends_as_canceled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = vec![ScriptedResult::progress("a"), ScriptedResult::progress("b"), ScriptedResult::progress("c")];
    let (coordinator, store, _drivers) = harness(dir.path(), Some(50), script).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.cancel_run(&run_id).await.expect("cancel");

    let record = run_to_terminal(&store, &run_id).await;
    assert_eq!(record.status, RunStatus::Canceled);
    assert_eq!(record.reason, Some(RunReason::Canceled));
}

/// §8 scenario 4: usage limit — a driver exit code of
/// `EXIT_CODE_USAGE_LIMIT` stops the run without marking it failed, since
/// the agent didn't err, it just ran out of budget.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn usage_limit_stops_without_failing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(10), vec![ScriptedResult::usage_limit()]).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    let record = run_to_terminal(&store, &run_id).await;

    assert_eq!(record.status, RunStatus::Stopped);
    assert_eq!(record.reason, Some(RunReason::UsageLimit));
}

/// §8 scenario 5: consecutive errors — two non-zero, non-usage-limit exit
/// codes in a row fail the run (a single blip does not).
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_consecutive_errors_fail_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = vec![ScriptedResult::error("boom"), ScriptedResult::error("boom again")];
    let (coordinator, store, _drivers) = harness(dir.path(), Some(10), script).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    let record = run_to_terminal(&store, &run_id).await;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.reason, Some(RunReason::Error));
}

/// A single error followed by recovery does not fail the run (the
/// consecutive-error counter resets on a successful iteration).
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_single_error_then_recovery_does_not_fail_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = vec![ScriptedResult::error("blip"), ScriptedResult::completed()];
    let (coordinator, store, _drivers) = harness(dir.path(), Some(10), script).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    let record = run_to_terminal(&store, &run_id).await;

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.reason, Some(RunReason::Completed));
}

/// §8 scenario 6 / I3: starting a run for a project that already has an
/// active run is rejected, not queued.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_while_already_running_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, _store, _drivers) = harness(dir.path(), Some(50), vec![ScriptedResult::progress("working")]).await;

    coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("first start");
    let err = coordinator.start_run("proj", "sprint-1", None, None, None).await.unwrap_err();
    assert!(matches!(err, aro_coordinator::CoordinatorError::AlreadyRunning(_)));
}

/// P9 (crash recovery): a `running` record with no live in-process task is
/// repaired to `failed` on the next coordinator's startup scan, so a crashed
/// orchestrator never leaves a run stuck `running` forever.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orphaned_running_record_is_recovered_as_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(5), vec![ScriptedResult::completed()]).await;

    let config = RunConfig {
        run_id: RunId::new("orphan-1"),
        project_id: "proj".to_string(),
        sprint_id: "sprint-1".to_string(),
        sprint_name: None,
        executor_mode: ExecutorMode::Local,
        sandbox_path: dir.path().join("sandbox"),
        sandbox_branch: "aro/orphan".to_string(),
        max_iterations: 3,
        selected_task_ids: vec![],
    };
    store.create(config).await.expect("create");
    store
        .update(&RunId::new("orphan-1"), RunPatch { status: Some(RunStatus::Running), pid: Some(Some(4242)), ..Default::default() })
        .await
        .expect("mark running");

    let recovered = coordinator.recover_orphaned_runs().await.expect("recover");
    assert_eq!(recovered, vec![RunId::new("orphan-1")]);

    let record = store.get(&RunId::new("orphan-1")).await.expect("get");
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.reason, Some(RunReason::Error));
}

/// P2 (idempotent cancel): canceling an already-terminal run is rejected
/// rather than silently re-applied.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_completion_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(5), vec![ScriptedResult::completed()]).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    run_to_terminal(&store, &run_id).await;

    let err = coordinator.cancel_run(&run_id).await.unwrap_err();
    assert!(matches!(err, aro_coordinator::CoordinatorError::AlreadyTerminal(_)));
}

/// §4.6 `list`: descending by `createdAt`, scoped to the requested project —
/// a run started for `proj` never leaks into another project's listing.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_is_scoped_to_the_requested_project() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (coordinator, store, _drivers) = harness(dir.path(), Some(5), vec![ScriptedResult::completed()]).await;

    let run_id = coordinator.start_run("proj", "sprint-1", None, None, None).await.expect("start");
    run_to_terminal(&store, &run_id).await;

    let records = coordinator.list("proj").await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].run_id, run_id);

    let other = coordinator.list("no-such-project").await.expect("list");
    assert!(other.is_empty());
}
