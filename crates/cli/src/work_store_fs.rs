// SPDX-License-Identifier: MIT

//! File-backed `WorkStore` (§6) for the standalone CLI binary.
//!
//! The real Work Store lives elsewhere in the product (sprint/task CRUD,
//! project settings forms) and is explicitly out of scope (§1 Non-goals).
//! This adapter reads the same shape off disk so `aro` is runnable without
//! that layer: `<projectRoot>/.pm/sprints/<sprintId>.json` and
//! `<projectRoot>/.pm/settings.json`.

use aro_coordinator::{
    AgentSettings, AutomationSettings, ProjectSettings, Sprint, SprintTask, WorkStore, WorkStoreError,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct SprintFile {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    tasks: Vec<SprintTaskFile>,
}

#[derive(Debug, Deserialize)]
struct SprintTaskFile {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    repo_root: Option<PathBuf>,
    automation: AutomationFile,
}

#[derive(Debug, Deserialize)]
struct AutomationFile {
    #[serde(default)]
    setup: Vec<String>,
    #[serde(default)]
    max_iterations: Option<u32>,
    agent: AgentFile,
    #[serde(default)]
    coding_style: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentFile {
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    permission_mode: Option<String>,
    #[serde(default)]
    extra_args: Vec<String>,
}

pub struct FsWorkStore {
    project_root: PathBuf,
}

impl FsWorkStore {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    fn sprint_path(&self, sprint_id: &str) -> PathBuf {
        self.project_root.join(".pm/sprints").join(format!("{sprint_id}.json"))
    }

    fn settings_path(&self) -> PathBuf {
        self.project_root.join(".pm/settings.json")
    }
}

#[async_trait]
impl WorkStore for FsWorkStore {
    async fn get_sprint(&self, project_id: &str, sprint_id: &str) -> Result<Sprint, WorkStoreError> {
        let path = self.sprint_path(sprint_id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| WorkStoreError::SprintNotFound(project_id.to_string(), sprint_id.to_string()))?;
        let file: SprintFile = serde_json::from_slice(&bytes)
            .map_err(|_| WorkStoreError::SprintNotFound(project_id.to_string(), sprint_id.to_string()))?;
        Ok(Sprint {
            id: sprint_id.to_string(),
            name: file.name,
            status: file.status,
            tasks: file.tasks.into_iter().map(|t| SprintTask { id: t.id, title: t.title }).collect(),
        })
    }

    async fn get_project_settings(&self, project_id: &str) -> Result<ProjectSettings, WorkStoreError> {
        let path = self.settings_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| WorkStoreError::ProjectNotFound(project_id.to_string()))?;
        let file: SettingsFile = serde_json::from_slice(&bytes)
            .map_err(|_| WorkStoreError::ProjectNotFound(project_id.to_string()))?;
        Ok(ProjectSettings {
            repo_root: file.repo_root.unwrap_or_else(|| self.project_root.clone()),
            automation: AutomationSettings {
                setup: file.automation.setup,
                max_iterations: file.automation.max_iterations,
                agent: AgentSettings {
                    name: file.automation.agent.name,
                    model: file.automation.agent.model,
                    permission_mode: file.automation.agent.permission_mode,
                    extra_args: file.automation.agent.extra_args,
                },
                coding_style: file.automation.coding_style,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_settings_and_sprint_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::create_dir_all(dir.path().join(".pm/sprints")).await.expect("mkdir");
        tokio::fs::write(
            dir.path().join(".pm/settings.json"),
            r#"{"automation":{"max_iterations":5,"agent":{"name":"claude"}}}"#,
        )
        .await
        .expect("write settings");
        tokio::fs::write(
            dir.path().join(".pm/sprints/sprint-1.json"),
            r#"{"name":"Sprint One","status":"active","tasks":[{"id":"t1","title":"Do it"}]}"#,
        )
        .await
        .expect("write sprint");

        let work_store = FsWorkStore::new(dir.path().to_path_buf());
        let settings = work_store.get_project_settings("proj").await.expect("settings");
        assert_eq!(settings.automation.max_iterations, Some(5));
        assert_eq!(settings.automation.agent.name, "claude");

        let sprint = work_store.get_sprint("proj", "sprint-1").await.expect("sprint");
        assert_eq!(sprint.tasks.len(), 1);
    }

    #[tokio::test]
    async fn missing_settings_is_project_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let work_store = FsWorkStore::new(dir.path().to_path_buf());
        let err = work_store.get_project_settings("proj").await.unwrap_err();
        assert!(matches!(err, WorkStoreError::ProjectNotFound(_)));
    }
}
