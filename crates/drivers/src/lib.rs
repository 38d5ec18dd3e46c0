// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aro-drivers: the Agent Driver capability (§4.4) — CLI and SDK variants
//! over the Process Supervisor, plus a scripted fake for tests.

mod cli_driver;
mod context;
mod driver;
mod error;
mod path_rewrite;
mod prompt;
mod sdk_driver;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use cli_driver::CliAgentDriver;
pub use context::{AgentConfig, CommandRecorder, DriverContext, IterationResult, LogSink, EXIT_CODE_USAGE_LIMIT};
pub use driver::AgentDriver;
pub use error::DriverError;
pub use path_rewrite::relativize;
pub use prompt::compose_prompt;
pub use sdk_driver::{DriverEvent, SdkAgentDriver};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentDriver, ScriptedResult};
