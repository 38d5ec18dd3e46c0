// SPDX-License-Identifier: MIT

//! Errors from Agent Driver operations (§4.4).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("supervisor error: {0}")]
    Supervisor(#[from] aro_supervisor::SupervisorError),
    #[error("malformed event from agent: {0}")]
    MalformedEvent(String),
}
