use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use sentinel_core::{CpuSampler, MetricsSource, PublishTransport, SystemMetrics};
use sentinel_dispatcher::Orchestrator;
use sentinel_infrastructure::MemoryLimiter;

use crate::health::LATENCY_CEILING_MS;

/// 宿主应用维护的连接计数
#[derive(Debug, Clone, Default)]
pub struct ConnectionGauge(Arc<AtomicU64>);

impl ConnectionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct ErrorWindow {
    since: Instant,
    failures: u64,
}

/// 进程本地指标来源
///
/// CPU 取自负载闸门的采样器，内存取自内存限制器（相对配置上限），
/// 网络延迟为一次传输 ping，错误率为两次采集之间编排器失败数的增量速率。
/// 没有存储探测，`storage_usage` 固定为 0。
pub struct LocalMetricsSource {
    cpu: Arc<dyn CpuSampler>,
    memory: MemoryLimiter,
    transport: Arc<dyn PublishTransport>,
    orchestrator: Orchestrator,
    connections: ConnectionGauge,
    window: Mutex<ErrorWindow>,
}

impl LocalMetricsSource {
    pub fn new(
        cpu: Arc<dyn CpuSampler>,
        memory: MemoryLimiter,
        transport: Arc<dyn PublishTransport>,
        orchestrator: Orchestrator,
        connections: ConnectionGauge,
    ) -> Self {
        let window = ErrorWindow {
            since: Instant::now(),
            failures: orchestrator.total_failures(),
        };
        Self {
            cpu,
            memory,
            transport,
            orchestrator,
            connections,
            window: Mutex::new(window),
        }
    }

    fn error_rate(&self) -> f64 {
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        let failures = self.orchestrator.total_failures();
        let elapsed = now.duration_since(window.since).as_secs_f64();
        let delta = failures.saturating_sub(window.failures);

        window.since = now;
        window.failures = failures;

        if elapsed <= f64::EPSILON {
            0.0
        } else {
            delta as f64 / elapsed
        }
    }
}

#[async_trait]
impl MetricsSource for LocalMetricsSource {
    async fn collect(&self) -> SystemMetrics {
        let latency_ms = match self.transport.ping().await {
            Ok(latency) => latency.as_secs_f64() * 1000.0,
            Err(e) => {
                debug!("ping failed, reporting worst-case latency: {}", e);
                LATENCY_CEILING_MS
            }
        };

        SystemMetrics {
            cpu_usage: (self.cpu.cpu_usage_percent() / 100.0).clamp(0.0, 1.0),
            memory_usage: self.memory.get_memory_stats().percentage.clamp(0.0, 1.0),
            connections: self.connections.get(),
            latency_ms,
            error_rate: self.error_rate(),
            storage_usage: 0.0,
        }
    }
}
