//! In-memory implementations of the sentinel-core traits

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sentinel_core::{
    BatchOperation, CpuSampler, MemorySample, MemorySampler, MetricsSource, PublishTransport,
    SchedulerError, SchedulerResult, SystemMetrics,
};

/// Transport that records every successful round trip.
///
/// Each call to `execute_batch` counts as one attempt; only non-failing calls
/// are recorded as batches.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    batches: Mutex<Vec<Vec<BatchOperation>>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    latency: Duration,
    ping_latency: Mutex<Duration>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch takes `latency` to execute (tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_ping_latency(&self, latency: Duration) {
        *self.ping_latency.lock().unwrap() = latency;
    }

    pub fn batches(&self) -> Vec<Vec<BatchOperation>> {
        self.batches.lock().unwrap().clone()
    }

    /// All successfully delivered operations, in delivery order.
    pub fn operations(&self) -> Vec<BatchOperation> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn round_trips(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.batches.lock().unwrap().clear();
        self.attempts.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublishTransport for InMemoryTransport {
    async fn execute_batch(&self, operations: &[BatchOperation]) -> SchedulerResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulerError::transport("in-memory transport set to fail"));
        }
        self.batches.lock().unwrap().push(operations.to_vec());
        Ok(())
    }

    async fn ping(&self) -> SchedulerResult<Duration> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulerError::transport("in-memory transport set to fail"));
        }
        Ok(*self.ping_latency.lock().unwrap())
    }
}

/// CPU sampler returning a settable value
#[derive(Debug, Clone)]
pub struct FixedCpuSampler {
    // f64 bits
    value: Arc<AtomicU64>,
}

impl FixedCpuSampler {
    pub fn new(percent: f64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(percent.to_bits())),
        }
    }

    pub fn set(&self, percent: f64) {
        self.value.store(percent.to_bits(), Ordering::SeqCst);
    }
}

impl CpuSampler for FixedCpuSampler {
    fn cpu_usage_percent(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::SeqCst))
    }
}

/// Memory sampler returning a settable sample
#[derive(Debug, Clone)]
pub struct FixedMemorySampler {
    sample: Arc<Mutex<MemorySample>>,
}

impl FixedMemorySampler {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            sample: Arc::new(Mutex::new(MemorySample {
                used_bytes,
                total_bytes,
            })),
        }
    }

    pub fn set_used(&self, used_bytes: u64) {
        self.sample.lock().unwrap().used_bytes = used_bytes;
    }
}

impl MemorySampler for FixedMemorySampler {
    fn sample(&self) -> MemorySample {
        *self.sample.lock().unwrap()
    }
}

/// Metrics source returning a settable reading
#[derive(Debug, Clone, Default)]
pub struct StaticMetricsSource {
    metrics: Arc<Mutex<SystemMetrics>>,
}

impl StaticMetricsSource {
    pub fn new(metrics: SystemMetrics) -> Self {
        Self {
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }

    pub fn set(&self, metrics: SystemMetrics) {
        *self.metrics.lock().unwrap() = metrics;
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn collect(&self) -> SystemMetrics {
        *self.metrics.lock().unwrap()
    }
}
