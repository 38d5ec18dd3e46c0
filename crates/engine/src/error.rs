// SPDX-License-Identifier: MIT

//! Errors from the Run Loop Engine (§4.5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] aro_store::StoreError),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] aro_sandbox::SandboxError),
    #[error("driver error: {0}")]
    Driver(#[from] aro_drivers::DriverError),
}
