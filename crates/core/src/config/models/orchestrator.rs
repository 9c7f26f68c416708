use serde::{Deserialize, Serialize};

use crate::config::circuit_breaker::{CircuitBreakerConfig, LoadGateConfig};
use crate::config::validation::ConfigValidator;
use crate::SchedulerResult;

/// Defaults applied to tasks registered without their own breaker or gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub load_gate: LoadGateConfig,
}

impl ConfigValidator for OrchestratorConfig {
    fn validate(&self) -> SchedulerResult<()> {
        self.circuit_breaker.validate()?;
        self.load_gate.validate()?;
        Ok(())
    }
}
