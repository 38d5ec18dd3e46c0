// SPDX-License-Identifier: MIT

//! Work Store interface (§6, consumed): sprints/tasks and project settings.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SprintTask {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    pub status: String,
    pub tasks: Vec<SprintTask>,
}

/// `automation.agent` (§6).
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
    pub extra_args: Vec<String>,
}

/// `automation` (§6).
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub setup: Vec<String>,
    pub max_iterations: Option<u32>,
    pub agent: AgentSettings,
    pub coding_style: Option<String>,
}

/// Project settings (§6). `repo_root` supplements the distilled interface —
/// the Coordinator has to resolve a repository somehow before it can ask the
/// Sandbox Manager for a worktree (§4.6 step 3), and the Work Store is the
/// only consulted collaborator positioned to know it.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub repo_root: PathBuf,
    pub automation: AutomationSettings,
}

#[derive(Debug, Error)]
pub enum WorkStoreError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("sprint not found: {0}/{1}")]
    SprintNotFound(String, String),
}

#[async_trait]
pub trait WorkStore: Send + Sync {
    async fn get_sprint(&self, project_id: &str, sprint_id: &str) -> Result<Sprint, WorkStoreError>;
    async fn get_project_settings(&self, project_id: &str) -> Result<ProjectSettings, WorkStoreError>;
}

/// In-memory `WorkStore` for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeWorkStore {
    sprints: parking_lot::Mutex<std::collections::HashMap<(String, String), Sprint>>,
    settings: parking_lot::Mutex<std::collections::HashMap<String, ProjectSettings>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeWorkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sprint(self, project_id: impl Into<String>, sprint: Sprint) -> Self {
        self.sprints.lock().insert((project_id.into(), sprint.id.clone()), sprint);
        self
    }

    pub fn with_settings(self, project_id: impl Into<String>, settings: ProjectSettings) -> Self {
        self.settings.lock().insert(project_id.into(), settings);
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WorkStore for FakeWorkStore {
    async fn get_sprint(&self, project_id: &str, sprint_id: &str) -> Result<Sprint, WorkStoreError> {
        self.sprints
            .lock()
            .get(&(project_id.to_string(), sprint_id.to_string()))
            .cloned()
            .ok_or_else(|| WorkStoreError::SprintNotFound(project_id.to_string(), sprint_id.to_string()))
    }

    async fn get_project_settings(&self, project_id: &str) -> Result<ProjectSettings, WorkStoreError> {
        self.settings
            .lock()
            .get(project_id)
            .cloned()
            .ok_or_else(|| WorkStoreError::ProjectNotFound(project_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_returns_not_found_for_unknown_project() {
        let work_store = FakeWorkStore::new();
        let err = work_store.get_project_settings("missing").await.unwrap_err();
        assert!(matches!(err, WorkStoreError::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn fake_round_trips_sprint_and_settings() {
        let work_store = FakeWorkStore::new()
            .with_sprint(
                "proj",
                Sprint {
                    id: "sprint-1".to_string(),
                    name: "Sprint One".to_string(),
                    status: "active".to_string(),
                    tasks: vec![SprintTask {
                        id: "t1".to_string(),
                        title: "Do the thing".to_string(),
                    }],
                },
            )
            .with_settings(
                "proj",
                ProjectSettings {
                    repo_root: PathBuf::from("/tmp/repo"),
                    automation: AutomationSettings {
                        setup: vec![],
                        max_iterations: Some(5),
                        agent: AgentSettings {
                            name: "claude".to_string(),
                            model: None,
                            permission_mode: None,
                            extra_args: vec![],
                        },
                        coding_style: None,
                    },
                },
            );

        let sprint = work_store.get_sprint("proj", "sprint-1").await.expect("sprint");
        assert_eq!(sprint.tasks.len(), 1);
        let settings = work_store.get_project_settings("proj").await.expect("settings");
        assert_eq!(settings.automation.max_iterations, Some(5));
    }
}
