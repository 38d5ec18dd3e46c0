// SPDX-License-Identifier: MIT

//! Repository Adapter (§6, consumed interface): worktree checkout, branch
//! push, and branch existence queries against the source repository.

use crate::error::SandboxError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timeout for git worktree/branch subprocesses (modeled on
/// `oj-adapters::subprocess::GIT_WORKTREE_TIMEOUT`).
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait RepositoryAdapter: Send + Sync {
    async fn checkout_worktree(
        &self,
        repo_root: &Path,
        branch: &str,
        dest_path: &Path,
    ) -> Result<(), SandboxError>;
    async fn push_branch(&self, repo_root: &Path, branch: &str) -> Result<bool, SandboxError>;
    async fn default_branch(&self, repo_root: &Path) -> Result<String, SandboxError>;
    async fn branch_exists(&self, repo_root: &Path, branch: &str) -> Result<bool, SandboxError>;
}

/// Real `git`-backed adapter, shelling out the way the teacher's executor
/// manages worktree effects (`oj-engine::executor::Effect::DeleteWorkspace`).
#[derive(Clone, Default)]
pub struct GitRepositoryAdapter;

async fn run_git(repo_root: &Path, args: &[&str]) -> Result<std::process::Output, SandboxError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo_root).args(args);
    match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(SandboxError::Git(format!("git {:?} failed: {err}", args))),
        Err(_) => Err(SandboxError::Git(format!(
            "git {:?} timed out after {}s",
            args,
            GIT_TIMEOUT.as_secs()
        ))),
    }
}

#[async_trait]
impl RepositoryAdapter for GitRepositoryAdapter {
    async fn checkout_worktree(
        &self,
        repo_root: &Path,
        branch: &str,
        dest_path: &Path,
    ) -> Result<(), SandboxError> {
        let branch_exists = self.branch_exists(repo_root, branch).await?;
        let dest = dest_path.to_string_lossy().to_string();
        let output = if branch_exists {
            run_git(repo_root, &["worktree", "add", &dest, branch]).await?
        } else {
            run_git(repo_root, &["worktree", "add", "-b", branch, &dest]).await?
        };
        if !output.status.success() {
            return Err(SandboxError::Git(format!(
                "git worktree add failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        debug!(branch, dest = %dest_path.display(), "worktree created");
        Ok(())
    }

    async fn push_branch(&self, repo_root: &Path, branch: &str) -> Result<bool, SandboxError> {
        let output = run_git(repo_root, &["push", "origin", branch]).await?;
        if !output.status.success() {
            warn!(
                branch,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "push_branch failed, leaving sandbox in place"
            );
            return Ok(false);
        }
        Ok(true)
    }

    async fn default_branch(&self, repo_root: &Path) -> Result<String, SandboxError> {
        let output = run_git(repo_root, &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"]).await?;
        if output.status.success() {
            let full = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if let Some(name) = full.strip_prefix("origin/") {
                return Ok(name.to_string());
            }
            return Ok(full);
        }
        // Fall back to the current HEAD branch name for repositories without
        // a configured remote (e.g. fresh local repos in tests).
        let head = run_git(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(String::from_utf8_lossy(&head.stdout).trim().to_string())
    }

    async fn branch_exists(&self, repo_root: &Path, branch: &str) -> Result<bool, SandboxError> {
        let output = run_git(
            repo_root,
            &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")],
        )
        .await?;
        Ok(output.status.success())
    }
}

/// In-memory fake for deterministic tests (§4.2 is exercised without a real
/// git checkout).
#[cfg(any(test, feature = "test-support"))]
pub struct FakeRepositoryAdapter {
    pub default_branch: String,
    pub existing_branches: parking_lot::Mutex<std::collections::HashSet<String>>,
    pub pushes_succeed: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRepositoryAdapter {
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
            existing_branches: parking_lot::Mutex::new(std::collections::HashSet::new()),
            pushes_succeed: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn with_existing_branch(self, branch: impl Into<String>) -> Self {
        self.existing_branches.lock().insert(branch.into());
        self
    }

    pub fn fail_pushes(self) -> Self {
        self.pushes_succeed
            .store(false, std::sync::atomic::Ordering::SeqCst);
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl RepositoryAdapter for FakeRepositoryAdapter {
    async fn checkout_worktree(
        &self,
        _repo_root: &Path,
        branch: &str,
        dest_path: &Path,
    ) -> Result<(), SandboxError> {
        self.existing_branches.lock().insert(branch.to_string());
        tokio::fs::create_dir_all(dest_path).await?;
        Ok(())
    }

    async fn push_branch(&self, _repo_root: &Path, _branch: &str) -> Result<bool, SandboxError> {
        Ok(self.pushes_succeed.load(std::sync::atomic::Ordering::SeqCst))
    }

    async fn default_branch(&self, _repo_root: &Path) -> Result<String, SandboxError> {
        Ok(self.default_branch.clone())
    }

    async fn branch_exists(&self, _repo_root: &Path, branch: &str) -> Result<bool, SandboxError> {
        Ok(self.existing_branches.lock().contains(branch))
    }
}
