// SPDX-License-Identifier: MIT

//! Filesystem-backed `RunStore` (§4.1), laid out per §6:
//! `<projectRoot>/plans/runs/<runId>.json` for the record and
//! `<projectRoot>/plans/runs/<runId>.progress.txt` for the append-only log.

use crate::error::StoreError;
use crate::io::{atomic_write, FsRunStoreIo, RunStoreIo};
use crate::patch::RunPatch;
use aro_core::{Clock, CommandRecord, RunConfig, RunId, RunRecord, RunStatus};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Operations exposed by the Run Store (§4.1). One implementation, `FsRunStore`,
/// ships for production; tests may provide their own over an in-memory `RunStoreIo`.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create(&self, config: RunConfig) -> Result<RunRecord, StoreError>;
    async fn get(&self, run_id: &RunId) -> Result<RunRecord, StoreError>;
    async fn list(&self, project_id: Option<&str>) -> Result<Vec<RunRecord>, StoreError>;
    async fn update(&self, run_id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError>;
    async fn append_command(&self, run_id: &RunId, command: CommandRecord) -> Result<(), StoreError>;
    async fn finish_command(&self, run_id: &RunId, exit_code: i32, finished_at_ms: u64) -> Result<(), StoreError>;
    async fn append_log(&self, run_id: &RunId, line: &str) -> Result<(), StoreError>;
    async fn tail_log(&self, run_id: &RunId, lines: usize) -> Result<Vec<String>, StoreError>;
    async fn request_cancel(&self, run_id: &RunId) -> Result<bool, StoreError>;
}

const MAX_RETRIES: u32 = 3;

/// Run Store backed by the real filesystem (§4.1, §6), generic over
/// `RunStoreIo` so tests can substitute a faulty fake to exercise retries,
/// and over `Clock` so timestamps stay deterministic under test.
pub struct FsRunStore<IO: RunStoreIo = FsRunStoreIo, C: Clock = aro_core::SystemClock> {
    runs_dir: PathBuf,
    io: IO,
    clock: C,
    locks: SyncMutex<HashMap<RunId, Arc<AsyncMutex<()>>>>,
}

impl<IO: RunStoreIo, C: Clock> FsRunStore<IO, C> {
    pub fn new(runs_dir: impl Into<PathBuf>, io: IO, clock: C) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            io,
            clock,
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    fn record_path(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }

    fn log_path(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.progress.txt"))
    }

    fn lock_for(&self, run_id: &RunId) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(run_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn read_record(&self, run_id: &RunId) -> Result<RunRecord, StoreError> {
        if !self.io.exists(&self.record_path(run_id)) {
            return Err(StoreError::NotFound(run_id.to_string()));
        }
        let bytes = self.io.read_bytes(&self.record_path(run_id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_record(&self, record: &RunRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.io, &self.record_path(&record.run_id), &bytes)
    }

    /// §4.1/§7: retry idempotent filesystem mutations up to `MAX_RETRIES`
    /// times with exponential backoff before surfacing the error.
    async fn with_retry<T>(
        &self,
        op_name: &str,
        mut attempt: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut delay_ms = 10u64;
        for try_num in 0..=MAX_RETRIES {
            match attempt() {
                Ok(v) => return Ok(v),
                Err(err) if matches!(err, StoreError::Io(_)) && try_num < MAX_RETRIES => {
                    warn!(op = op_name, attempt = try_num, error = %err, "store_io retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("loop always returns within MAX_RETRIES + 1 iterations")
    }
}

#[async_trait]
impl<IO: RunStoreIo, C: Clock> RunStore for FsRunStore<IO, C> {
    async fn create(&self, config: RunConfig) -> Result<RunRecord, StoreError> {
        let run_id = config.run_id.clone();
        if self.io.exists(&self.record_path(&run_id)) {
            return Err(StoreError::AlreadyExists(run_id.to_string()));
        }
        self.io.create_dir_all(&self.runs_dir)?;
        let record = RunRecord::new(config, &self.clock);
        self.with_retry("create", || self.write_record(&record)).await?;
        debug!(run_id = %record.run_id, "run created");
        Ok(record)
    }

    async fn get(&self, run_id: &RunId) -> Result<RunRecord, StoreError> {
        self.read_record(run_id)
    }

    async fn list(&self, project_id: Option<&str>) -> Result<Vec<RunRecord>, StoreError> {
        let mut out = Vec::new();
        for path in self.io.list_dir(&self.runs_dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = self.io.read_bytes(&path)?;
            let record: RunRecord = serde_json::from_slice(&bytes)?;
            if project_id.map_or(true, |p| record.project_id == p) {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.created_at_ms);
        Ok(out)
    }

    async fn update(&self, run_id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;

        let mut record = self.read_record(run_id)?;
        if record.is_terminal() && !patch.touches_only_finalizing_fields() {
            return Err(StoreError::Stale(run_id.to_string()));
        }

        if let Some(v) = patch.current_iteration {
            record.current_iteration = v;
        }
        if let Some(v) = patch.pid {
            record.pid = v;
        }
        if let Some(v) = patch.last_task_id {
            record.last_task_id = v;
        }
        if let Some(v) = patch.last_message {
            record.last_message = v;
        }
        if let Some(v) = patch.last_command {
            record.last_command = v;
        }
        if let Some(v) = patch.last_command_exit_code {
            record.last_command_exit_code = v;
        }
        if let Some(v) = patch.last_progress_at_ms {
            record.last_progress_at_ms = v;
        }
        if let Some(message) = patch.push_error {
            record.push_error(message);
        }
        if let Some(v) = patch.started_at_ms {
            record.started_at_ms = v;
        }
        if let Some(v) = patch.finished_at_ms {
            record.finished_at_ms = v;
        }
        if let (Some(status), Some(reason)) = (patch.status, patch.reason) {
            record.status = status;
            record.reason = Some(reason);
        } else if let Some(status) = patch.status {
            record.status = status;
        }

        self.with_retry("update", || self.write_record(&record)).await?;
        Ok(record)
    }

    async fn append_command(&self, run_id: &RunId, command: CommandRecord) -> Result<(), StoreError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;
        let mut record = self.read_record(run_id)?;
        record.push_command(command);
        self.with_retry("append_command", || self.write_record(&record)).await
    }

    async fn finish_command(&self, run_id: &RunId, exit_code: i32, finished_at_ms: u64) -> Result<(), StoreError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;
        let mut record = self.read_record(run_id)?;
        record.finish_last_command(exit_code, finished_at_ms);
        self.with_retry("finish_command", || self.write_record(&record)).await
    }

    /// I6: appended lines are total-ordered per run — the per-run lock
    /// serializes writers so interleaved iterations never tear a line.
    async fn append_log(&self, run_id: &RunId, line: &str) -> Result<(), StoreError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;
        let mut buf = line.as_bytes().to_vec();
        buf.push(b'\n');
        let path = self.log_path(run_id);
        self.with_retry("append_log", || self.io.append_bytes(&path, &buf)).await
    }

    async fn tail_log(&self, run_id: &RunId, lines: usize) -> Result<Vec<String>, StoreError> {
        let path = self.log_path(run_id);
        if !self.io.exists(&path) {
            return Ok(Vec::new());
        }
        let bytes = self.io.read_bytes(&path)?;
        let text = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|s| s.to_string()).collect())
    }

    async fn request_cancel(&self, run_id: &RunId) -> Result<bool, StoreError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;
        let mut record = self.read_record(run_id)?;
        let did_set = record.request_cancel(&self.clock);
        if did_set {
            self.with_retry("request_cancel", || self.write_record(&record)).await?;
        }
        Ok(did_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aro_core::{ExecutorMode, FakeClock};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(run_id: &str, project_id: &str) -> RunConfig {
        RunConfig {
            run_id: RunId::new(run_id),
            project_id: project_id.to_string(),
            sprint_id: "sprint-1".to_string(),
            sprint_name: None,
            executor_mode: ExecutorMode::Local,
            sandbox_path: PathBuf::from("/tmp/sandbox"),
            sandbox_branch: "aro/run-1".to_string(),
            max_iterations: 5,
            selected_task_ids: vec![],
        }
    }

    fn store() -> (FsRunStore<FsRunStoreIo, FakeClock>, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let store = FsRunStore::new(dir.path().join("runs"), FsRunStoreIo, FakeClock::new());
        (store, dir)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (store, _dir) = store();
        let created = store.create(config("run-1", "proj-a")).await.expect("create");
        let fetched = store.get(&created.run_id).await.expect("get");
        assert_eq!(fetched.run_id, created.run_id);
        assert_eq!(fetched.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_run_id() {
        let (store, _dir) = store();
        store.create(config("run-1", "proj-a")).await.expect("first create");
        let err = store.create(config("run-1", "proj-a")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_on_terminal_run_rejects_non_final_fields() {
        let (store, _dir) = store();
        let created = store.create(config("run-1", "proj-a")).await.expect("create");
        store
            .update(
                &created.run_id,
                RunPatch {
                    status: Some(RunStatus::Completed),
                    reason: Some(aro_core::RunReason::Completed),
                    ..Default::default()
                },
            )
            .await
            .expect("terminal update");

        let err = store
            .update(
                &created.run_id,
                RunPatch {
                    current_iteration: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
    }

    #[tokio::test]
    async fn list_filters_by_project() {
        let (store, _dir) = store();
        store.create(config("run-1", "proj-a")).await.expect("create a");
        store.create(config("run-2", "proj-b")).await.expect("create b");
        let all = store.list(None).await.expect("list all");
        assert_eq!(all.len(), 2);
        let only_a = store.list(Some("proj-a")).await.expect("list a");
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].project_id, "proj-a");
    }

    #[tokio::test]
    async fn append_log_and_tail_respects_window() {
        let (store, _dir) = store();
        let created = store.create(config("run-1", "proj-a")).await.expect("create");
        for i in 0..10 {
            store.append_log(&created.run_id, &format!("line {i}")).await.expect("append");
        }
        let tail = store.tail_log(&created.run_id, 3).await.expect("tail");
        assert_eq!(tail, vec!["line 7", "line 8", "line 9"]);
    }

    #[tokio::test]
    async fn request_cancel_is_idempotent() {
        let (store, _dir) = store();
        let created = store.create(config("run-1", "proj-a")).await.expect("create");
        assert!(store.request_cancel(&created.run_id).await.expect("first"));
        assert!(!store.request_cancel(&created.run_id).await.expect("second"));
    }

    #[tokio::test]
    async fn append_command_then_finish_closes_it() {
        let (store, _dir) = store();
        let created = store.create(config("run-1", "proj-a")).await.expect("create");
        store
            .append_command(
                &created.run_id,
                CommandRecord::new("claude", vec![], PathBuf::from("/tmp"), 0),
            )
            .await
            .expect("append command");
        store.finish_command(&created.run_id, 0, 100).await.expect("finish command");
        let record = store.get(&created.run_id).await.expect("get");
        assert!(record.commands[0].is_finished());
        assert_eq!(record.last_command_exit_code, Some(0));
    }
}
