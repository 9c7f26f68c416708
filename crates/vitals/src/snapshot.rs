use serde::{Deserialize, Serialize};

use sentinel_core::SystemMetrics;

use crate::health::HealthClass;

/// 节点健康快照，每个发布周期新建一次
///
/// 线上格式为 camelCase JSON：
/// `{nodeId, vitals: {health, load: {cpu, memory, network, storage}, connections, uptime, lastConsensus}, timestamp, publisher}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSnapshot {
    pub node_id: String,
    pub vitals: Vitals,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub publisher: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    pub health: HealthClass,
    pub load: LoadVector,
    pub connections: u64,
    /// 进程运行时长（秒）
    pub uptime: u64,
    /// 上一次成功发布的毫秒时间戳
    pub last_consensus: Option<i64>,
}

/// 负载向量；`network` 为往返延迟（毫秒），其余为 0-1 比例
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadVector {
    pub cpu: f64,
    pub memory: f64,
    pub network: f64,
    pub storage: f64,
}

impl From<&SystemMetrics> for LoadVector {
    fn from(metrics: &SystemMetrics) -> Self {
        Self {
            cpu: metrics.cpu_usage,
            memory: metrics.memory_usage,
            network: metrics.latency_ms,
            storage: metrics.storage_usage,
        }
    }
}

impl VitalsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
