// SPDX-License-Identifier: MIT

//! Errors from Process Supervisor operations (§4.3).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("failed to signal process group: {0}")]
    Signal(String),
}
