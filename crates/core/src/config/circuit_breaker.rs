use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::ConfigValidator;
use crate::{SchedulerError, SchedulerResult};

pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-task breaker settings. Durations are expressed in seconds on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "duration_serde")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
        }
    }
}

impl ConfigValidator for CircuitBreakerConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.failure_threshold == 0 {
            return Err(SchedulerError::configuration(
                "failure_threshold must be greater than 0",
            ));
        }

        if self.recovery_timeout.is_zero() {
            return Err(SchedulerError::configuration(
                "recovery_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Advisory CPU gate applied before a task body runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadGateConfig {
    pub enabled: bool,
    pub cpu_threshold_percent: f64,
}

impl Default for LoadGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_threshold_percent: 70.0,
        }
    }
}

impl LoadGateConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_threshold(cpu_threshold_percent: f64) -> Self {
        Self {
            enabled: true,
            cpu_threshold_percent,
        }
    }
}

impl ConfigValidator for LoadGateConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if !(0.0..=100.0).contains(&self.cpu_threshold_percent) {
            return Err(SchedulerError::configuration(format!(
                "cpu_threshold_percent must be within 0-100, got {}",
                self.cpu_threshold_percent
            )));
        }
        Ok(())
    }
}
