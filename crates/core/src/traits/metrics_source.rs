/// 外部指标提供者的一次读数
///
/// `cpu_usage`/`memory_usage`/`storage_usage` 为 0-1 比例，
/// `error_rate` 为每秒事件数。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub connections: u64,
    pub latency_ms: f64,
    pub error_rate: f64,
    pub storage_usage: f64,
}

/// 系统指标来源
///
/// 由宿主应用提供，健康评分只依赖这个接口。
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    async fn collect(&self) -> SystemMetrics;
}
