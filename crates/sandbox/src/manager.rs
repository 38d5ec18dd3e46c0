// SPDX-License-Identifier: MIT

//! Sandbox Manager (§4.2): per-run worktree lifecycle bound to a branch.

use crate::branch::{normalize_branch_name, resolve_collision};
use crate::error::SandboxError;
use crate::repository::RepositoryAdapter;
use aro_core::RunId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Directory, relative to `projectRoot`, sandboxes are created under (§6).
pub const SANDBOX_RESERVED_DIR: &str = ".pm/sandboxes";

pub struct SandboxManager {
    repo: Arc<dyn RepositoryAdapter>,
}

impl SandboxManager {
    pub fn new(repo: Arc<dyn RepositoryAdapter>) -> Self {
        Self { repo }
    }

    pub fn sandbox_path(&self, project_root: &Path, run_id: &RunId) -> PathBuf {
        project_root.join(SANDBOX_RESERVED_DIR).join(run_id.as_str())
    }

    /// Normalize `requested_branch`, resolve collisions against the
    /// repository's branch namespace, and produce a worktree at
    /// `<projectRoot>/.pm/sandboxes/<runId>` rooted on the resolved branch.
    /// Returns `(sandboxPath, resolvedBranch)`.
    pub async fn create(
        &self,
        project_root: &Path,
        run_id: &RunId,
        requested_branch: &str,
    ) -> Result<(PathBuf, String), SandboxError> {
        let sandbox_path = self.sandbox_path(project_root, run_id);
        if sandbox_path.exists() {
            return Err(SandboxError::AlreadyExists(run_id.to_string()));
        }

        let normalized = normalize_branch_name(requested_branch);
        let resolved = resolve_collision(&normalized, |candidate| {
            let repo = self.repo.clone();
            let project_root = project_root.to_path_buf();
            async move {
                repo.branch_exists(&project_root, &candidate)
                    .await
                    .unwrap_or(false)
            }
        })
        .await;

        self.repo
            .checkout_worktree(project_root, &resolved, &sandbox_path)
            .await?;
        info!(run_id = %run_id, branch = %resolved, path = %sandbox_path.display(), "sandbox created");
        Ok((sandbox_path, resolved))
    }

    pub fn exists(&self, project_root: &Path, run_id: &RunId) -> bool {
        self.sandbox_path(project_root, run_id).exists()
    }

    /// §4.2 `destroy`: removes the sandbox only if the branch was pushed
    /// successfully, or the caller explicitly requests dropping the work
    /// (e.g. a canceled/failed run with no salvageable changes).
    pub async fn destroy(
        &self,
        project_root: &Path,
        run_id: &RunId,
        branch: &str,
        drop_work: bool,
    ) -> Result<bool, SandboxError> {
        let sandbox_path = self.sandbox_path(project_root, run_id);
        if !sandbox_path.exists() {
            return Ok(false);
        }

        let pushed = if drop_work {
            true
        } else {
            self.repo.push_branch(project_root, branch).await?
        };

        if !pushed {
            warn!(run_id = %run_id, branch, "push failed, preserving sandbox for recovery");
            return Ok(false);
        }

        let dot_git = sandbox_path.join(".git");
        if tokio::fs::symlink_metadata(&dot_git)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            let _ = tokio::process::Command::new("git")
                .arg("worktree")
                .arg("remove")
                .arg("--force")
                .arg(&sandbox_path)
                .current_dir(&sandbox_path)
                .output()
                .await;
        }
        if sandbox_path.exists() {
            tokio::fs::remove_dir_all(&sandbox_path).await?;
        }
        info!(run_id = %run_id, "sandbox destroyed");
        Ok(true)
    }
}
