// SPDX-License-Identifier: MIT

//! Errors from Sandbox Manager and Repository Adapter operations (§4.2, §6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox for run {0} already exists")]
    AlreadyExists(String),
    #[error("sandbox for run {0} not found")]
    NotFound(String),
    #[error("git command failed: {0}")]
    Git(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
