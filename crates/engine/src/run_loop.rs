// SPDX-License-Identifier: MIT

//! Run Loop Engine (§4.5): the iteration state machine for a single run.

use crate::error::EngineError;
use crate::recorder::StoreCommandRecorder;
use aro_core::{Clock, RunId, RunReason, RunStatus};
use aro_drivers::{AgentConfig, AgentDriver, DriverContext, LogSink};
use aro_sandbox::SandboxManager;
use aro_store::{RunPatch, RunStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The terminal marker an agent emits to signal normal completion (§4.5
/// step 5, case-sensitive).
const COMPLETION_MARKER: &str = "<promise>COMPLETE</promise>";

/// Two consecutive non-zero, non-usage-limit exit codes end the run (§4.5
/// step 5).
const MAX_CONSECUTIVE_ERRORS: u32 = 2;

pub struct RunLoopEngine<C: Clock> {
    store: Arc<dyn RunStore>,
    sandbox: Arc<SandboxManager>,
    project_root: PathBuf,
    clock: C,
}

impl<C: Clock + 'static> RunLoopEngine<C> {
    pub fn new(store: Arc<dyn RunStore>, sandbox: Arc<SandboxManager>, project_root: PathBuf, clock: C) -> Self {
        Self {
            store,
            sandbox,
            project_root,
            clock,
        }
    }

    /// Drive `run_id` to a terminal state, invoking `driver` once per
    /// iteration. Returns the final Run Record.
    pub async fn run(
        &self,
        run_id: RunId,
        driver: Arc<dyn AgentDriver>,
        agent_config: AgentConfig,
        log_sink: LogSink,
        cancellation_token: CancellationToken,
    ) -> Result<aro_core::RunRecord, EngineError> {
        let record = self.store.get(&run_id).await?;
        self.store
            .update(
                &run_id,
                RunPatch {
                    pid: Some(None),
                    started_at_ms: Some(Some(self.clock.epoch_ms())),
                    ..Default::default()
                },
            )
            .await?;

        let mut consecutive_errors = 0u32;
        let sandbox_path = record.sandbox_path.clone();
        let sandbox_branch = record.sandbox_branch.clone();
        let command_recorder = Arc::new(StoreCommandRecorder::new(self.store.clone(), run_id.clone(), self.clock.clone()));

        let (final_status, final_reason) = loop {
            let current = self.store.get(&run_id).await?;

            // Step 1: check cancellation.
            if current.cancellation_requested() {
                info!(run_id = %run_id, "cancellation observed, ending run");
                break (RunStatus::Canceled, RunReason::Canceled);
            }

            // Step 2: check iteration bound.
            if current.at_iteration_bound() {
                info!(run_id = %run_id, iteration = current.current_iteration, "iteration bound reached");
                break (RunStatus::Stopped, RunReason::MaxIterations);
            }

            // Step 3: increment and persist.
            let next_iteration = current.current_iteration + 1;
            self.store
                .update(
                    &run_id,
                    RunPatch {
                        current_iteration: Some(next_iteration),
                        ..Default::default()
                    },
                )
                .await?;

            // Step 4: invoke driver (the only suspension point on external work).
            let ctx = DriverContext {
                iteration_number: next_iteration,
                sandbox_path: sandbox_path.clone(),
                log_sink: log_sink.clone(),
                command_recorder: command_recorder.clone(),
                cancellation_token: cancellation_token.clone(),
                config: agent_config.clone(),
            };
            let invocation = driver.invoke(ctx).await;

            // Step 5: classify result.
            let result = match invocation {
                Ok(result) => result,
                Err(err) => {
                    warn!(run_id = %run_id, error = %err, "driver invocation failed");
                    self.store
                        .update(
                            &run_id,
                            RunPatch {
                                push_error: Some(err.to_string()),
                                ..Default::default()
                            },
                        )
                        .await?;
                    break (RunStatus::Failed, RunReason::Error);
                }
            };

            if result.exit_code < 0 {
                if cancellation_token.is_cancelled() {
                    break (RunStatus::Canceled, RunReason::Canceled);
                }
                self.store
                    .update(
                        &run_id,
                        RunPatch {
                            push_error: Some(format!("agent killed, exit_code={}", result.exit_code)),
                            ..Default::default()
                        },
                    )
                    .await?;
                break (RunStatus::Failed, RunReason::Error);
            } else if result.exit_code == aro_drivers::EXIT_CODE_USAGE_LIMIT {
                break (RunStatus::Stopped, RunReason::UsageLimit);
            } else if result.exit_code != 0 {
                consecutive_errors += 1;
                self.store
                    .update(
                        &run_id,
                        RunPatch {
                            push_error: Some(format!("agent exited with code {}", result.exit_code)),
                            ..Default::default()
                        },
                    )
                    .await?;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    break (RunStatus::Failed, RunReason::Error);
                }
            } else {
                consecutive_errors = 0;
                if result.output.contains(COMPLETION_MARKER) {
                    break (RunStatus::Completed, RunReason::Completed);
                }
            }

            // Step 6: persist progress.
            self.store
                .update(
                    &run_id,
                    RunPatch {
                        last_message: Some(Some(result.output.clone())),
                        last_progress_at_ms: Some(Some(self.clock.epoch_ms())),
                        last_task_id: result.last_task_id.clone().map(Some),
                        ..Default::default()
                    },
                )
                .await?;
            // Step 7: return to step 1.
        };

        self.finalize(&run_id, &sandbox_branch, final_status, final_reason).await
    }

    /// Terminal transition (§4.5): set status/reason/finishedAt, clear pid,
    /// best-effort push + sandbox destroy.
    async fn finalize(
        &self,
        run_id: &RunId,
        sandbox_branch: &str,
        status: RunStatus,
        reason: RunReason,
    ) -> Result<aro_core::RunRecord, EngineError> {
        let finished_at_ms = self.clock.epoch_ms();
        let record = self
            .store
            .update(
                run_id,
                RunPatch {
                    status: Some(status),
                    reason: Some(reason),
                    finished_at_ms: Some(Some(finished_at_ms)),
                    pid: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        let destroyed = self
            .sandbox
            .destroy(&self.project_root, run_id, sandbox_branch, false)
            .await
            .unwrap_or(false);
        if !destroyed {
            self.store
                .update(
                    run_id,
                    RunPatch {
                        push_error: Some("branch push failed; sandbox preserved for recovery".to_string()),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.store.get(run_id).await.map_err(EngineError::from)
    }
}
