// SPDX-License-Identifier: MIT

//! Errors from Run Store operations (§4.1, §7 `store_io`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    NotFound(String),
    #[error("run already exists: {0}")]
    AlreadyExists(String),
    #[error("stale update: run {0} is terminal and patch touches non-final fields")]
    Stale(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
