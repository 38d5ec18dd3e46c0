// SPDX-License-Identifier: MIT

//! Maps an agent name (§6 `automation.agent.name`) to its `AgentDriver`.

use crate::error::CoordinatorError;
use aro_drivers::AgentDriver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn AgentDriver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, driver: Arc<dyn AgentDriver>) {
        self.drivers.write().insert(name.into(), driver);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AgentDriver>, CoordinatorError> {
        self.drivers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoordinatorError::UnknownAgent(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aro_drivers::FakeAgentDriver;

    #[test]
    fn resolves_registered_driver_by_name() {
        let registry = DriverRegistry::new();
        registry.register("claude", Arc::new(FakeAgentDriver::new("claude", vec![])));
        assert!(registry.resolve("claude").is_ok());
    }

    #[test]
    fn unregistered_name_is_an_error() {
        let registry = DriverRegistry::new();
        let err = registry.resolve("ghost").unwrap_err();
        assert!(matches!(err, CoordinatorError::UnknownAgent(_)));
    }
}
