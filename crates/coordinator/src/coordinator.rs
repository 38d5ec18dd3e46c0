// SPDX-License-Identifier: MIT

//! Run Coordinator (§4.6): validates preconditions, resolves collaborators,
//! and launches/tracks Run Loop Engine tasks; plus startup crash recovery
//! and graceful shutdown draining (§5).

use crate::driver_registry::DriverRegistry;
use crate::error::CoordinatorError;
use crate::log_sink::store_log_sink;
use crate::work_store::WorkStore;
use aro_core::{Clock, ExecutorMode, IdGen, RunConfig, RunId, RunReason, RunRecord, RunStatus};
use aro_drivers::AgentConfig;
use aro_engine::RunLoopEngine;
use aro_sandbox::SandboxManager;
use aro_store::{RunPatch, RunStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct ActiveRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Accepts start/cancel/get/list requests (§4.6 surface), launching the Run
/// Loop Engine on a background task per run and enforcing I3 (one active run
/// per project) and the global concurrency bound (§5).
pub struct RunCoordinator<C: Clock, G: IdGen> {
    store: Arc<dyn RunStore>,
    sandbox: Arc<SandboxManager>,
    work_store: Arc<dyn WorkStore>,
    drivers: Arc<DriverRegistry>,
    clock: C,
    id_gen: G,
    semaphore: Arc<Semaphore>,
    accepting: AtomicBool,
    active: Mutex<HashMap<RunId, ActiveRun>>,
    project_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<C: Clock + 'static, G: IdGen + 'static> RunCoordinator<C, G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RunStore>,
        sandbox: Arc<SandboxManager>,
        work_store: Arc<dyn WorkStore>,
        drivers: Arc<DriverRegistry>,
        clock: C,
        id_gen: G,
        global_concurrency: usize,
    ) -> Self {
        Self {
            store,
            sandbox,
            work_store,
            drivers,
            clock,
            id_gen,
            semaphore: Arc::new(Semaphore::new(global_concurrency)),
            accepting: AtomicBool::new(true),
            active: Mutex::new(HashMap::new()),
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    fn project_lock_for(&self, project_id: &str) -> Arc<AsyncMutex<()>> {
        self.project_locks
            .lock()
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// §4.6 `startRun`. Returns the new run's id immediately; the loop runs
    /// to completion on a background task.
    pub async fn start_run(
        &self,
        project_id: &str,
        sprint_id: &str,
        branch_name: Option<String>,
        max_iterations_override: Option<u32>,
        task_ids: Option<Vec<String>>,
    ) -> Result<RunId, CoordinatorError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(CoordinatorError::ShuttingDown);
        }

        let project_lock = self.project_lock_for(project_id);
        let _guard = project_lock.lock().await;

        let existing = self.store.list(Some(project_id)).await?;
        if existing.iter().any(RunRecord::is_active) {
            return Err(CoordinatorError::AlreadyRunning(project_id.to_string()));
        }

        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| CoordinatorError::TooManyActiveRuns)?;

        let settings = self.work_store.get_project_settings(project_id).await?;
        let sprint = self.work_store.get_sprint(project_id, sprint_id).await?;
        let driver = self.drivers.resolve(&settings.automation.agent.name)?;

        let run_id = RunId::new(self.id_gen.next());
        let branch_hint = branch_name.unwrap_or_else(|| format!("aro/{sprint_id}-{}", run_id.short(8)));
        let (sandbox_path, sandbox_branch) = self
            .sandbox
            .create(&settings.repo_root, &run_id, &branch_hint)
            .await?;

        let max_iterations = max_iterations_override
            .or(settings.automation.max_iterations)
            .unwrap_or_else(aro_core::env::default_max_iterations);
        let selected_task_ids = task_ids.unwrap_or_else(|| sprint.tasks.iter().map(|t| t.id.clone()).collect());

        let config = RunConfig {
            run_id: run_id.clone(),
            project_id: project_id.to_string(),
            sprint_id: sprint_id.to_string(),
            sprint_name: Some(sprint.name.clone()),
            executor_mode: resolve_executor_mode(),
            sandbox_path,
            sandbox_branch,
            max_iterations,
            selected_task_ids,
        };
        self.store.create(config).await?;

        let agent_config = AgentConfig {
            name: settings.automation.agent.name.clone(),
            model: settings.automation.agent.model.clone(),
            permission_mode: settings.automation.agent.permission_mode.clone(),
            extra_args: settings.automation.agent.extra_args.clone(),
            coding_style: settings.automation.coding_style.clone(),
        };

        let token = CancellationToken::new();
        let log_sink = store_log_sink(self.store.clone(), run_id.clone());
        let engine = RunLoopEngine::new(self.store.clone(), self.sandbox.clone(), settings.repo_root, self.clock.clone());

        let run_id_for_task = run_id.clone();
        let token_for_task = token.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = engine
                .run(run_id_for_task.clone(), driver, agent_config, log_sink, token_for_task)
                .await
            {
                warn!(run_id = %run_id_for_task, error = %err, "run loop ended with an error");
            }
        });

        self.active.lock().insert(run_id.clone(), ActiveRun { token, handle });
        info!(run_id = %run_id, project_id, "run started");
        Ok(run_id)
    }

    /// §4.6 `cancelRun`. Sets the cooperative flag on the Store and fires the
    /// preemptive cancellation token so an in-flight process is signaled too.
    pub async fn cancel_run(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        let record = self.get_record(run_id).await?;
        if record.is_terminal() {
            return Err(CoordinatorError::AlreadyTerminal(run_id.to_string()));
        }
        self.store.request_cancel(run_id).await?;
        if let Some(active) = self.active.lock().get(run_id) {
            active.token.cancel();
        }
        Ok(())
    }

    /// §4.6 `getRun`. `tail` defaults to `DEFAULT_TAIL_LINES`, clamped to
    /// `MAX_TAIL_LINES`.
    pub async fn get_run(&self, run_id: &RunId, tail: Option<usize>) -> Result<(RunRecord, Vec<String>), CoordinatorError> {
        let record = self.get_record(run_id).await?;
        let lines = tail
            .unwrap_or(aro_core::env::DEFAULT_TAIL_LINES)
            .min(aro_core::env::MAX_TAIL_LINES);
        let log = self.store.tail_log(run_id, lines).await?;
        Ok((record, log))
    }

    /// §4.6 `list`. Descending by `createdAt`.
    pub async fn list(&self, project_id: &str) -> Result<Vec<RunRecord>, CoordinatorError> {
        let mut records = self.store.list(Some(project_id)).await?;
        records.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(records)
    }

    /// Scans for `running` records with no live in-process task — the case
    /// where the orchestrator crashed mid-run (§5 "repaired on next start",
    /// §7 `sandbox_setup`-style recovery). Marks each `failed`/`error`.
    pub async fn recover_orphaned_runs(&self) -> Result<Vec<RunId>, CoordinatorError> {
        let mut recovered = Vec::new();
        for record in self.store.list(None).await? {
            let tracked = self.active.lock().contains_key(&record.run_id);
            if record.status == RunStatus::Running && !tracked {
                self.store
                    .update(
                        &record.run_id,
                        RunPatch {
                            status: Some(RunStatus::Failed),
                            reason: Some(RunReason::Error),
                            finished_at_ms: Some(Some(self.clock.epoch_ms())),
                            pid: Some(None),
                            push_error: Some("orphaned at startup: no live supervisor".to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                warn!(run_id = %record.run_id, "recovered orphaned run as failed");
                recovered.push(record.run_id);
            }
        }
        Ok(recovered)
    }

    /// §5 orchestrator shutdown: stop accepting starts, request cancellation
    /// on every active run, wait up to `drain` for them to finish, then leave
    /// stragglers to the Process Supervisor's own kill path.
    pub async fn shutdown(&self, drain: Duration) {
        self.accepting.store(false, Ordering::SeqCst);

        let run_ids: Vec<RunId> = self.active.lock().keys().cloned().collect();
        for run_id in &run_ids {
            let _ = self.store.request_cancel(run_id).await;
            if let Some(active) = self.active.lock().get(run_id) {
                active.token.cancel();
            }
        }

        let handles: Vec<(RunId, JoinHandle<()>)> = {
            let mut active = self.active.lock();
            run_ids.into_iter().filter_map(|run_id| active.remove(&run_id).map(|a| (run_id, a.handle))).collect()
        };

        let deadline = tokio::time::Instant::now() + drain;
        for (run_id, handle) in handles {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => info!(run_id = %run_id, "run drained cleanly"),
                Ok(Err(join_err)) => warn!(run_id = %run_id, error = %join_err, "run task panicked"),
                Err(_) => warn!(run_id = %run_id, "drain window elapsed; leaving run to finish in background"),
            }
        }
    }

    async fn get_record(&self, run_id: &RunId) -> Result<RunRecord, CoordinatorError> {
        match self.store.get(run_id).await {
            Ok(record) => Ok(record),
            Err(aro_store::StoreError::NotFound(id)) => Err(CoordinatorError::NotFound(id)),
            Err(other) => Err(other.into()),
        }
    }
}

/// `RUN_LOOP_EXECUTOR_MODE=remote` degrades to `local` (§9 Open Question —
/// no remote executor is implemented).
fn resolve_executor_mode() -> ExecutorMode {
    match aro_core::env::executor_mode_override().as_deref() {
        Some("containerized") => ExecutorMode::Containerized,
        Some("remote") => {
            warn!("RUN_LOOP_EXECUTOR_MODE=remote has no implementation; degrading to local");
            ExecutorMode::Local
        }
        _ => ExecutorMode::Local,
    }
}
