use std::future::Future;
use std::sync::Arc;

use metrics::histogram;
use tracing::{debug, warn};

use sentinel_core::{MemoryConfig, MemorySample, MemorySampler};

/// 进程内存采样（Linux 读取 procfs）
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemorySampler;

impl ProcessMemorySampler {
    pub fn new() -> Self {
        Self
    }

    /// 从 `/proc/<pid>/status` 或 `/proc/meminfo` 格式的文本中读取某个 kB 字段
    pub fn parse_kb_field(text: &str, field: &str) -> Option<u64> {
        text.lines()
            .find(|line| line.starts_with(field))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    }

    #[cfg(target_os = "linux")]
    fn read_linux() -> MemorySample {
        let used_bytes = std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| Self::parse_kb_field(&s, "VmRSS:"))
            .unwrap_or(0);
        let total_bytes = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|s| Self::parse_kb_field(&s, "MemTotal:"))
            .unwrap_or(0);

        MemorySample {
            used_bytes,
            total_bytes,
        }
    }
}

impl MemorySampler for ProcessMemorySampler {
    fn sample(&self) -> MemorySample {
        #[cfg(target_os = "linux")]
        {
            Self::read_linux()
        }
        #[cfg(not(target_os = "linux"))]
        {
            MemorySample::default()
        }
    }
}

/// 内存使用统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    /// 进程当前占用（字节）
    pub used: u64,
    /// 主机总内存（字节）
    pub total: u64,
    /// 配置的上限（字节）
    pub limit: u64,
    /// used / limit
    pub percentage: f64,
}

/// 内存限制器
///
/// 只提供信息性的闸门：`monitor_operation` 不会中止操作，
/// 调用方需要在执行前自行检查 `can_continue()`。
#[derive(Clone)]
pub struct MemoryLimiter {
    limit_bytes: u64,
    warning_ratio: f64,
    sampler: Arc<dyn MemorySampler>,
}

impl MemoryLimiter {
    pub fn new(config: &MemoryConfig, sampler: Arc<dyn MemorySampler>) -> Self {
        Self {
            limit_bytes: config.limit_bytes(),
            warning_ratio: config.warning_ratio,
            sampler,
        }
    }

    pub fn get_memory_stats(&self) -> MemoryStats {
        let sample = self.sampler.sample();
        let percentage = if self.limit_bytes == 0 {
            0.0
        } else {
            sample.used_bytes as f64 / self.limit_bytes as f64
        };

        MemoryStats {
            used: sample.used_bytes,
            total: sample.total_bytes,
            limit: self.limit_bytes,
            percentage,
        }
    }

    pub fn is_limit_reached(&self) -> bool {
        self.get_memory_stats().used >= self.limit_bytes
    }

    pub fn is_warning_threshold_reached(&self) -> bool {
        self.get_memory_stats().percentage >= self.warning_ratio
    }

    pub fn can_continue(&self) -> bool {
        !self.is_limit_reached()
    }

    /// 执行操作并记录前后的内存变化
    pub async fn monitor_operation<F, T>(&self, operation: F, name: &str) -> T
    where
        F: Future<Output = T>,
    {
        let before = self.get_memory_stats();
        let output = operation.await;
        let after = self.get_memory_stats();

        let delta = after.used as i64 - before.used as i64;
        histogram!("sentinel_operation_memory_delta_bytes", "operation" => name.to_string())
            .record(delta as f64);

        if after.percentage >= self.warning_ratio {
            warn!(
                operation = name,
                delta_bytes = delta,
                used_bytes = after.used,
                limit_bytes = after.limit,
                percentage = after.percentage,
                "memory usage above warning threshold after operation"
            );
        } else {
            debug!(
                operation = name,
                delta_bytes = delta,
                used_bytes = after.used,
                "operation memory delta"
            );
        }

        output
    }
}
