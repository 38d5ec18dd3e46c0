// SPDX-License-Identifier: MIT

//! Shared driver input/output types (§4.4).

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Agent-specific configuration surfaced from project settings (§6
/// `getProjectSettings().automation.agent`).
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub name: String,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
    pub extra_args: Vec<String>,
    pub coding_style: Option<String>,
}

/// Callback invoked one line at a time as the agent produces output.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Durably records a Command Record around one agent invocation (§4.4:
/// "MUST append a durable Command Record before invoking the agent and
/// finalize it after"). The engine supplies an implementation backed by the
/// Run Store; drivers only see this narrow seam.
pub trait CommandRecorder: Send + Sync {
    fn begin(&self, command: &str, args: &[String], cwd: &std::path::Path);
    fn finish(&self, exit_code: i32);
}

pub struct DriverContext {
    pub iteration_number: u32,
    pub sandbox_path: PathBuf,
    pub log_sink: LogSink,
    pub command_recorder: Arc<dyn CommandRecorder>,
    pub cancellation_token: CancellationToken,
    pub config: AgentConfig,
}

/// Result of one `AgentDriver::invoke` call (§4.4).
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub output: String,
    pub exit_code: i32,
    pub last_task_id: Option<String>,
}

/// `exitCode` sentinel meaning the agent signaled a usage/rate limit.
pub const EXIT_CODE_USAGE_LIMIT: i32 = 2;
