// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aro-coordinator: the Run Coordinator (§4.6) and Log Tailer (§4.7) —
//! accepts start/cancel/get/list requests, resolves the Work Store and
//! Repository Adapter, and launches the Run Loop Engine per run.

mod coordinator;
mod driver_registry;
mod error;
mod log_sink;
mod work_store;

pub use coordinator::RunCoordinator;
pub use driver_registry::DriverRegistry;
pub use error::CoordinatorError;
pub use log_sink::store_log_sink;
pub use work_store::{AgentSettings, AutomationSettings, ProjectSettings, Sprint, SprintTask, WorkStore, WorkStoreError};

#[cfg(any(test, feature = "test-support"))]
pub use work_store::FakeWorkStore;
