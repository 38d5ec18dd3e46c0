// SPDX-License-Identifier: MIT

//! Errors from the Run Coordinator (§4.6).

use crate::work_store::WorkStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("project {0} already has an active run")]
    AlreadyRunning(String),
    #[error("run not found: {0}")]
    NotFound(String),
    #[error("run already terminal: {0}")]
    AlreadyTerminal(String),
    #[error("too many active runs")]
    TooManyActiveRuns,
    #[error("no driver registered for agent: {0}")]
    UnknownAgent(String),
    #[error("coordinator is shutting down")]
    ShuttingDown,
    #[error("work store error: {0}")]
    WorkStore(#[from] WorkStoreError),
    #[error("store error: {0}")]
    Store(#[from] aro_store::StoreError),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] aro_sandbox::SandboxError),
    #[error("engine error: {0}")]
    Engine(#[from] aro_engine::EngineError),
}
