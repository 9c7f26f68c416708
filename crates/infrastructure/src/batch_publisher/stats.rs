use std::time::Duration;

use metrics::{counter, histogram};

/// 批量发布统计
///
/// 平均值都是增量维护的运行平均，只统计成功冲刷的批次。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublisherStats {
    pub total_operations: u64,
    pub total_batches: u64,
    pub average_batch_size: f64,
    pub average_flush_duration: Duration,
    pub failed_batches: u64,
    pub dropped_operations: u64,
}

impl PublisherStats {
    pub(crate) fn record_flush(&mut self, batch_size: usize, duration: Duration) {
        self.total_operations += batch_size as u64;
        self.total_batches += 1;
        self.average_batch_size = self.total_operations as f64 / self.total_batches as f64;

        let n = self.total_batches as f64;
        let previous = self.average_flush_duration.as_secs_f64();
        let average = previous + (duration.as_secs_f64() - previous) / n;
        self.average_flush_duration = Duration::from_secs_f64(average.max(0.0));

        counter!("sentinel_publisher_operations_total").increment(batch_size as u64);
        counter!("sentinel_publisher_batches_total").increment(1);
        histogram!("sentinel_publisher_flush_duration_seconds").record(duration.as_secs_f64());
    }

    pub(crate) fn record_failure(&mut self, batch_size: usize) {
        self.failed_batches += 1;
        self.dropped_operations += batch_size as u64;

        counter!("sentinel_publisher_failed_batches_total").increment(1);
        counter!("sentinel_publisher_dropped_operations_total").increment(batch_size as u64);
    }
}
