use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::ConfigValidator;
use crate::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub limit_mb: u64,
    pub warning_ratio: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            limit_mb: 512,
            warning_ratio: 0.8,
        }
    }
}

impl MemoryConfig {
    pub fn limit_bytes(&self) -> u64 {
        self.limit_mb * 1024 * 1024
    }
}

impl ConfigValidator for MemoryConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.limit_mb == 0 {
            return Err(SchedulerError::configuration(
                "memory.limit_mb must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.warning_ratio) {
            return Err(SchedulerError::configuration(
                "memory.warning_ratio must be within 0-1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl ConfigValidator for TimeoutConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(SchedulerError::configuration(
                "timeout.default_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_listen: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_listen: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.metrics_enabled && self.metrics_listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(SchedulerError::configuration(format!(
                "observability.metrics_listen is not a socket address: {}",
                self.metrics_listen
            )));
        }
        Ok(())
    }
}
