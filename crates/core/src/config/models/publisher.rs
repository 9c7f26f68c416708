use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::ConfigValidator;
use crate::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub redis_url: String,
    pub max_batch_size: usize,
    pub flush_interval_ms: u64,
    pub connect_retry_attempts: u32,
    pub connect_retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            max_batch_size: 100,
            flush_interval_ms: 100,
            connect_retry_attempts: 3,
            connect_retry_delay_ms: 1000,
        }
    }
}

impl PublisherConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }
}

impl ConfigValidator for PublisherConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.redis_url.is_empty() {
            return Err(SchedulerError::configuration("redis_url cannot be empty"));
        }
        if self.max_batch_size == 0 {
            return Err(SchedulerError::configuration(
                "max_batch_size must be greater than 0",
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(SchedulerError::configuration(
                "flush_interval_ms must be greater than 0",
            ));
        }
        if self.connect_retry_attempts == 0 {
            return Err(SchedulerError::configuration(
                "connect_retry_attempts must be greater than 0",
            ));
        }
        Ok(())
    }
}
