//! Batched publish pipeline
//!
//! Outbound publish/set/delete commands accumulate in a single pending batch
//! which is flushed to the transport in one round trip, either as soon as it
//! holds `max_batch_size` operations or `flush_interval` after its first
//! operation, whichever comes first.
//!
//! The pending batch is a swappable slot. A flush takes the batch out of the
//! slot before talking to the transport, so anything enqueued while a flush is
//! in flight lands in a fresh batch. Failed flushes are logged and dropped;
//! telemetry prefers freshness over completeness.

mod stats;

pub use stats::PublisherStats;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sentinel_core::{BatchOperation, PublishTransport, PublisherConfig, SchedulerError, SchedulerResult};

struct PendingBatch {
    id: u64,
    operations: Vec<BatchOperation>,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Size,
    Timer,
    Manual,
    Destroy,
}

impl FlushTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Timer => "timer",
            Self::Manual => "manual",
            Self::Destroy => "destroy",
        }
    }
}

struct Shared {
    transport: Arc<dyn PublishTransport>,
    max_batch_size: usize,
    flush_interval: Duration,
    pending: Mutex<Option<PendingBatch>>,
    // 每次冲刷从取走批次到往返结束都持有读锁；destroy 取写锁等待它们
    in_flight: RwLock<()>,
    next_batch_id: AtomicU64,
    stats: StdMutex<PublisherStats>,
    closed: AtomicBool,
}

/// Batched publisher handle; clones share the same pending batch.
#[derive(Clone)]
pub struct BatchedPublisher {
    shared: Arc<Shared>,
}

impl BatchedPublisher {
    pub fn new(transport: Arc<dyn PublishTransport>, config: &PublisherConfig) -> Self {
        Self::with_limits(transport, config.max_batch_size, config.flush_interval())
    }

    pub fn with_limits(
        transport: Arc<dyn PublishTransport>,
        max_batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                max_batch_size: max_batch_size.max(1),
                flush_interval,
                pending: Mutex::new(None),
                in_flight: RwLock::new(()),
                next_batch_id: AtomicU64::new(1),
                stats: StdMutex::new(PublisherStats::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub async fn batch_publish(
        &self,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> SchedulerResult<()> {
        self.enqueue(BatchOperation::publish(channel, message)).await
    }

    pub async fn batch_set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl_seconds: Option<u64>,
    ) -> SchedulerResult<()> {
        self.enqueue(BatchOperation::set(key, value, ttl_seconds))
            .await
    }

    pub async fn batch_delete(&self, key: impl Into<String>) -> SchedulerResult<()> {
        self.enqueue(BatchOperation::delete(key)).await
    }

    /// Append to the current batch, creating it (and arming its timer) if
    /// needed. The `max_batch_size`-th operation flushes before returning.
    pub async fn enqueue(&self, operation: BatchOperation) -> SchedulerResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::PublisherClosed);
        }

        let _in_flight = self.shared.in_flight.read().await;
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::PublisherClosed);
        }

        let full_batch = {
            let mut pending = self.shared.pending.lock().await;
            let batch = pending.get_or_insert_with(|| self.open_batch());
            batch.operations.push(operation);

            if batch.operations.len() >= self.shared.max_batch_size {
                pending.take()
            } else {
                None
            }
        };

        if let Some(batch) = full_batch {
            self.shared.flush_batch(batch, FlushTrigger::Size).await;
        }
        Ok(())
    }

    /// Flush whatever is pending. Returns the number of operations delivered,
    /// zero when nothing was pending or the transport failed.
    pub async fn flush(&self) -> usize {
        let _in_flight = self.shared.in_flight.read().await;
        let batch = self.shared.pending.lock().await.take();
        match batch {
            Some(batch) => self.shared.flush_batch(batch, FlushTrigger::Manual).await,
            None => 0,
        }
    }

    /// Final flush and timer teardown. Waits for flushes already talking to
    /// the transport, so the last write has completed when this returns.
    /// Later enqueues fail with [`SchedulerError::PublisherClosed`]. Safe to
    /// call more than once.
    pub async fn destroy(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!("batched publisher already destroyed");
            return;
        }

        let _exclusive = self.shared.in_flight.write().await;
        let batch = self.shared.pending.lock().await.take();
        let flushed = match batch {
            Some(batch) => self.shared.flush_batch(batch, FlushTrigger::Destroy).await,
            None => 0,
        };
        info!(flushed, "batched publisher destroyed");
    }

    pub async fn pending_operations(&self) -> usize {
        self.shared
            .pending
            .lock()
            .await
            .as_ref()
            .map_or(0, |batch| batch.operations.len())
    }

    pub fn stats(&self) -> PublisherStats {
        self.shared.lock_stats().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> Arc<dyn PublishTransport> {
        self.shared.transport.clone()
    }

    fn open_batch(&self) -> PendingBatch {
        let id = self.shared.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let interval = self.shared.flush_interval;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(shared) = weak.upgrade() {
                shared.flush_expired(id).await;
            }
        });

        debug!(batch_id = id, "opened new batch");
        PendingBatch {
            id,
            operations: Vec::with_capacity(self.shared.max_batch_size),
            timer: Some(timer),
        }
    }
}

impl Shared {
    /// Timer path: only flush if the batch this timer was armed for is still pending.
    async fn flush_expired(&self, batch_id: u64) {
        let _in_flight = self.in_flight.read().await;
        let batch = {
            let mut pending = self.pending.lock().await;
            if pending.as_ref().map(|b| b.id) == Some(batch_id) {
                pending.take()
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.flush_batch(batch, FlushTrigger::Timer).await;
        }
    }

    async fn flush_batch(&self, mut batch: PendingBatch, trigger: FlushTrigger) -> usize {
        if let Some(timer) = batch.timer.take() {
            // the timer task is the caller on the timer path
            if trigger != FlushTrigger::Timer {
                timer.abort();
            }
        }

        let size = batch.operations.len();
        if size == 0 {
            return 0;
        }

        let start = Instant::now();
        match self.transport.execute_batch(&batch.operations).await {
            Ok(()) => {
                let duration = start.elapsed();
                self.lock_stats().record_flush(size, duration);
                debug!(
                    batch_id = batch.id,
                    batch_size = size,
                    trigger = trigger.as_str(),
                    duration = ?duration,
                    "batch flushed"
                );
                size
            }
            Err(e) => {
                self.lock_stats().record_failure(size);
                error!(
                    batch_id = batch.id,
                    batch_size = size,
                    trigger = trigger.as_str(),
                    "batch flush failed, dropping operations: {}",
                    e
                );
                0
            }
        }
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, PublisherStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(batch) = self.pending.get_mut().take() {
            if !batch.operations.is_empty() {
                warn!(
                    dropped = batch.operations.len(),
                    "batched publisher dropped without destroy(); pending operations lost"
                );
            }
            if let Some(timer) = batch.timer {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_testing_utils::InMemoryTransport;

    fn publisher(transport: &Arc<InMemoryTransport>, max: usize) -> BatchedPublisher {
        BatchedPublisher::with_limits(transport.clone(), max, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_flushes_once_immediately() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = publisher(&transport, 5);

        for i in 0..5 {
            publisher
                .batch_set(format!("key-{i}"), "v", Some(30))
                .await
                .unwrap();
        }

        assert_eq!(transport.round_trips(), 1);
        assert_eq!(transport.batches()[0].len(), 5);
        assert_eq!(publisher.pending_operations().await, 0);

        // the aborted timer must not produce a second flush
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.round_trips(), 1);

        let stats = publisher.stats();
        assert_eq!(stats.total_batches, 1);
        assert_eq!(stats.total_operations, 5);
        assert!((stats.average_batch_size - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_operation_flushes_after_interval() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = publisher(&transport, 50);

        publisher.batch_publish("vitals:updates", "hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.round_trips(), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(transport.round_trips(), 1);
        assert_eq!(
            transport.batches()[0],
            vec![BatchOperation::publish("vitals:updates", "hello")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_flushes_pending_once() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = publisher(&transport, 50);

        for i in 0..5 {
            publisher.batch_delete(format!("k{i}")).await.unwrap();
        }
        publisher.destroy().await;

        assert_eq!(transport.round_trips(), 1);
        assert_eq!(transport.batches()[0].len(), 5);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.round_trips(), 1);

        let err = publisher.batch_delete("late").await.unwrap_err();
        assert!(matches!(err, SchedulerError::PublisherClosed));
        publisher.destroy().await;
        assert_eq!(transport.round_trips(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_waits_for_in_flight_timer_flush() {
        let transport = Arc::new(InMemoryTransport::new().with_latency(Duration::from_millis(50)));
        let publisher = publisher(&transport, 50);

        publisher.batch_set("node", "alive", Some(30)).await.unwrap();

        // timer flush starts at 100ms and completes at 150ms
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(transport.attempts(), 1);
        assert_eq!(transport.round_trips(), 0);
        assert_eq!(publisher.pending_operations().await, 0);

        let start = Instant::now();
        publisher.destroy().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(transport.round_trips(), 1);
        assert_eq!(publisher.stats().total_batches, 1);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_is_dropped_not_retried() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.set_failing(true);
        let publisher = publisher(&transport, 3);

        for _ in 0..3 {
            publisher.batch_set("k", "v", None).await.unwrap();
        }
        assert_eq!(transport.attempts(), 1);
        assert_eq!(transport.round_trips(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.attempts(), 1);

        let stats = publisher.stats();
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.dropped_operations, 3);
        assert_eq!(stats.total_batches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_flush_starts_new_batch() {
        let transport = Arc::new(InMemoryTransport::new().with_latency(Duration::from_millis(40)));
        let publisher = publisher(&transport, 2);

        let first = publisher.clone();
        let flushing = tokio::spawn(async move {
            first.batch_set("a", "1", None).await.unwrap();
            first.batch_set("b", "2", None).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        publisher.batch_set("c", "3", None).await.unwrap();
        assert_eq!(publisher.pending_operations().await, 1);

        flushing.await.unwrap();
        assert_eq!(transport.round_trips(), 1);
        assert_eq!(transport.batches()[0].len(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.round_trips(), 2);
        assert_eq!(
            transport.batches()[1],
            vec![BatchOperation::set("c", "3", None)]
        );
    }

    #[tokio::test]
    async fn test_manual_flush() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = BatchedPublisher::with_limits(transport.clone(), 10, Duration::from_secs(60));

        assert_eq!(publisher.flush().await, 0);
        publisher.batch_publish("ch", "a").await.unwrap();
        publisher.batch_publish("ch", "b").await.unwrap();
        assert_eq!(publisher.flush().await, 2);
        assert_eq!(transport.round_trips(), 1);
    }
}
