// SPDX-License-Identifier: MIT

//! Field-level patch applied atomically to a `RunRecord` (§4.1 `update`).

use aro_core::{RunReason, RunStatus};

/// A partial update to a `RunRecord`. Every field is optional; `None` means
/// "leave unchanged". `status`/`reason` together represent a terminal
/// transition when both are `Some`.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    pub reason: Option<RunReason>,
    pub current_iteration: Option<u32>,
    pub pid: Option<Option<u32>>,
    pub last_task_id: Option<Option<String>>,
    pub last_message: Option<Option<String>>,
    pub last_command: Option<Option<String>>,
    pub last_command_exit_code: Option<Option<i32>>,
    pub last_progress_at_ms: Option<Option<u64>>,
    pub push_error: Option<String>,
    pub started_at_ms: Option<Option<u64>>,
    pub finished_at_ms: Option<Option<u64>>,
}

impl RunPatch {
    /// Whether this patch only appends terminal-safe bookkeeping (I1: a
    /// terminal record stays read-only except for in-flight finalization).
    pub fn touches_only_finalizing_fields(&self) -> bool {
        self.current_iteration.is_none()
            && self.pid.is_none()
            && self.last_task_id.is_none()
            && self.started_at_ms.is_none()
    }
}
