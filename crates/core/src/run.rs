// SPDX-License-Identifier: MIT

//! Run Record and Command Record — the canonical state of one agent
//! invocation (see §3 DATA MODEL).

use crate::clock::Clock;
use crate::id::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
    Stopped,
}

impl RunStatus {
    /// I1: once a run enters one of these, the record is read-only except
    /// for log/command appends that finalize in-flight writes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Canceled | RunStatus::Stopped
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Canceled => write!(f, "canceled"),
            RunStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Terminal reason, set only when `status` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunReason {
    Completed,
    MaxIterations,
    Canceled,
    Error,
    UsageLimit,
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReason::Completed => write!(f, "completed"),
            RunReason::MaxIterations => write!(f, "max_iterations"),
            RunReason::Canceled => write!(f, "canceled"),
            RunReason::Error => write!(f, "error"),
            RunReason::UsageLimit => write!(f, "usage_limit"),
        }
    }
}

/// Where the agent subprocess is executed. `Remote` degrades to `Local`
/// (Open Question in §9 — see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    #[default]
    Local,
    Containerized,
    Remote,
}

impl fmt::Display for ExecutorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorMode::Local => write!(f, "local"),
            ExecutorMode::Containerized => write!(f, "containerized"),
            ExecutorMode::Remote => write!(f, "remote"),
        }
    }
}

/// One invocation of the agent within one iteration (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandRecord {
    pub fn new(command: impl Into<String>, args: Vec<String>, cwd: PathBuf, started_at_ms: u64) -> Self {
        Self {
            command: command.into(),
            args,
            cwd,
            started_at_ms,
            finished_at_ms: None,
            exit_code: None,
        }
    }

    /// P6: Command closure — finalize once, idempotently ignoring later calls.
    pub fn finish(&mut self, exit_code: i32, finished_at_ms: u64) {
        if self.finished_at_ms.is_none() {
            self.finished_at_ms = Some(finished_at_ms);
            self.exit_code = Some(exit_code);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at_ms.is_some()
    }
}

/// Configuration supplied by the coordinator when creating a new run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_id: RunId,
    pub project_id: String,
    pub sprint_id: String,
    pub sprint_name: Option<String>,
    pub executor_mode: ExecutorMode,
    pub sandbox_path: PathBuf,
    pub sandbox_branch: String,
    pub max_iterations: u32,
    pub selected_task_ids: Vec<String>,
}

/// The canonical state of one agent invocation (§3 Run Record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub project_id: String,
    pub sprint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_name: Option<String>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RunReason>,
    pub executor_mode: ExecutorMode,
    pub sandbox_path: PathBuf,
    pub sandbox_branch: String,
    pub max_iterations: u32,
    pub current_iteration: u32,
    pub selected_task_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command_exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress_at_ms: Option<u64>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_at_ms: Option<u64>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
}

/// Bound on `last_message` retention (§4.5 step 6: "last 1 KiB of output").
pub const LAST_MESSAGE_CAP_BYTES: usize = 1024;

impl RunRecord {
    /// Create a new `queued` run record (Coordinator lifecycle, §3).
    pub fn new(config: RunConfig, clock: &impl Clock) -> Self {
        Self {
            run_id: config.run_id,
            project_id: config.project_id,
            sprint_id: config.sprint_id,
            sprint_name: config.sprint_name,
            status: RunStatus::Queued,
            reason: None,
            executor_mode: config.executor_mode,
            sandbox_path: config.sandbox_path,
            sandbox_branch: config.sandbox_branch,
            max_iterations: config.max_iterations,
            current_iteration: 0,
            selected_task_ids: config.selected_task_ids,
            last_task_id: None,
            last_message: None,
            last_command: None,
            last_command_exit_code: None,
            last_progress_at_ms: None,
            errors: Vec::new(),
            pid: None,
            cancellation_requested_at_ms: None,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            finished_at_ms: None,
            commands: Vec::new(),
        }
    }

    /// Whether this run is active (I3: at most one of these per project).
    pub fn is_active(&self) -> bool {
        matches!(self.status, RunStatus::Queued | RunStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to `running` once the supervisor reports the child spawned.
    pub fn mark_running(&mut self, pid: u32, clock: &impl Clock) {
        self.status = RunStatus::Running;
        self.pid = Some(pid);
        self.started_at_ms = Some(clock.epoch_ms());
    }

    /// I2: enforce `current_iteration <= max_iterations` at every mutation point.
    pub fn increment_iteration(&mut self) {
        debug_assert!(self.current_iteration < self.max_iterations);
        self.current_iteration += 1;
    }

    pub fn at_iteration_bound(&self) -> bool {
        self.current_iteration >= self.max_iterations
    }

    /// I7: cancellation idempotence — only the first call sets the field.
    /// Returns `true` if this call was the one that set it.
    pub fn request_cancel(&mut self, clock: &impl Clock) -> bool {
        if self.cancellation_requested_at_ms.is_some() {
            return false;
        }
        self.cancellation_requested_at_ms = Some(clock.epoch_ms());
        true
    }

    pub fn cancellation_requested(&self) -> bool {
        self.cancellation_requested_at_ms.is_some()
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// §4.5 step 6: truncate to the last `LAST_MESSAGE_CAP_BYTES` bytes,
    /// never splitting a UTF-8 code point.
    pub fn record_progress(
        &mut self,
        message: &str,
        last_task_id: Option<String>,
        clock: &impl Clock,
    ) {
        self.last_message = Some(tail_bytes(message, LAST_MESSAGE_CAP_BYTES));
        self.last_progress_at_ms = Some(clock.epoch_ms());
        if let Some(task_id) = last_task_id {
            self.last_task_id = Some(task_id);
        }
    }

    /// I5: append-only, ordered by `started_at`.
    pub fn push_command(&mut self, cmd: CommandRecord) {
        self.last_command = Some(cmd.command.clone());
        self.commands.push(cmd);
    }

    /// Finalize the most recently pushed, still-open command.
    pub fn finish_last_command(&mut self, exit_code: i32, finished_at_ms: u64) {
        if let Some(cmd) = self.commands.iter_mut().rev().find(|c| !c.is_finished()) {
            cmd.finish(exit_code, finished_at_ms);
        }
        self.last_command_exit_code = Some(exit_code);
    }

    /// Terminal transition (§4.5): set `status`/`reason`/`finished_at`, clear `pid`.
    pub fn mark_terminal(&mut self, status: RunStatus, reason: RunReason, clock: &impl Clock) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.reason = Some(reason);
        self.finished_at_ms = Some(clock.epoch_ms());
        self.pid = None;
    }

    /// P6: every command in a terminal run has non-null `finished_at`/`exit_code`.
    pub fn commands_closed(&self) -> bool {
        !self.is_terminal() || self.commands.iter().all(CommandRecord::is_finished)
    }
}

/// Truncate `s` to at most `cap` bytes on a UTF-8 boundary, keeping the tail.
fn tail_bytes(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let start = s.len() - cap;
    let mut boundary = start;
    while boundary < s.len() && !s.is_char_boundary(boundary) {
        boundary += 1;
    }
    s[boundary..].to_string()
}

/// Builder for `RunRecord` with test defaults.
#[cfg(any(test, feature = "test-support"))]
pub struct RunRecordBuilder {
    record: RunRecord,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RunRecordBuilder {
    fn default() -> Self {
        Self {
            record: RunRecord {
                run_id: RunId::new("run-1"),
                project_id: "project-1".to_string(),
                sprint_id: "sprint-1".to_string(),
                sprint_name: None,
                status: RunStatus::Queued,
                reason: None,
                executor_mode: ExecutorMode::Local,
                sandbox_path: PathBuf::from(".aro/sandboxes/run-1"),
                sandbox_branch: "aro/run-1".to_string(),
                max_iterations: 10,
                current_iteration: 0,
                selected_task_ids: Vec::new(),
                last_task_id: None,
                last_message: None,
                last_command: None,
                last_command_exit_code: None,
                last_progress_at_ms: None,
                errors: Vec::new(),
                pid: None,
                cancellation_requested_at_ms: None,
                created_at_ms: 0,
                started_at_ms: None,
                finished_at_ms: None,
                commands: Vec::new(),
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RunRecordBuilder {
    pub fn run_id(mut self, v: impl Into<String>) -> Self {
        self.record.run_id = RunId::new(v.into());
        self
    }
    pub fn project_id(mut self, v: impl Into<String>) -> Self {
        self.record.project_id = v.into();
        self
    }
    pub fn status(mut self, v: RunStatus) -> Self {
        self.record.status = v;
        self
    }
    pub fn max_iterations(mut self, v: u32) -> Self {
        self.record.max_iterations = v;
        self
    }
    pub fn current_iteration(mut self, v: u32) -> Self {
        self.record.current_iteration = v;
        self
    }
    pub fn build(self) -> RunRecord {
        self.record
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RunRecord {
    /// Create a builder with test defaults.
    pub fn builder() -> RunRecordBuilder {
        RunRecordBuilder::default()
    }
}
