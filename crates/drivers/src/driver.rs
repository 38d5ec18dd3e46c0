// SPDX-License-Identifier: MIT

//! The Agent Driver capability (§4.4): a polymorphic `{name, invoke}` pair
//! with at least two concrete variants, mirroring `oj-adapters::AgentAdapter`.

use crate::context::{DriverContext, IterationResult};
use crate::error::DriverError;
use async_trait::async_trait;

#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Name registered in project settings (`automation.agent.name`, §6).
    fn name(&self) -> &str;

    async fn invoke(&self, ctx: DriverContext) -> Result<IterationResult, DriverError>;
}
