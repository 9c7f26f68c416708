use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::ConfigValidator;
use crate::{SchedulerError, SchedulerResult};

/// 节点健康广播配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    /// 节点标识，默认取主机名
    pub node_id: String,
    /// 发布周期（秒）
    pub publish_interval_secs: u64,
    /// 快照过期时间（秒），必须大于发布周期
    pub ttl_secs: u64,
    /// 每个节点快照键的前缀
    pub key_prefix: String,
    /// 实时广播频道
    pub channel: String,
    /// 写入快照的发布者名称
    pub publisher: String,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            publish_interval_secs: 15,
            ttl_secs: 30,
            key_prefix: "vitals:".to_string(),
            channel: "vitals:updates".to_string(),
            publisher: concat!("sentinel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

fn default_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "sentinel-node".to_string())
}

impl VitalsConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn node_key(&self) -> String {
        format!("{}{}", self.key_prefix, self.node_id)
    }
}

impl ConfigValidator for VitalsConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.node_id.trim().is_empty() {
            return Err(SchedulerError::configuration("vitals.node_id cannot be empty"));
        }
        if self.publish_interval_secs == 0 {
            return Err(SchedulerError::configuration(
                "vitals.publish_interval_secs must be greater than 0",
            ));
        }
        // one missed tick must not let the key expire
        if self.ttl_secs <= self.publish_interval_secs {
            return Err(SchedulerError::configuration(format!(
                "vitals.ttl_secs ({}) must exceed publish_interval_secs ({})",
                self.ttl_secs, self.publish_interval_secs
            )));
        }
        Ok(())
    }
}
