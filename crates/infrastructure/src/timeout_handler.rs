//! Bounded waiting for async operations
//!
//! The handler races an operation against a timer and always hands back a
//! [`TimedResult`]; it never returns an `Err` of its own. A timeout only stops
//! the *waiting*: the operation runs on its own spawned task and keeps going
//! until it finishes, its eventual result is discarded. Callers that need the
//! work itself stopped must build cancellation into the operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use sentinel_core::{SchedulerError, SchedulerResult, TimeoutConfig};

/// Outcome of a timed operation plus how long the caller waited.
#[derive(Debug)]
pub struct TimedResult<T> {
    pub operation_id: String,
    pub outcome: SchedulerResult<T>,
    pub duration: Duration,
}

impl<T> TimedResult<T> {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn timed_out(&self) -> bool {
        matches!(&self.outcome, Err(e) if e.is_timeout())
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&SchedulerError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> SchedulerResult<T> {
        self.outcome
    }
}

type PendingTimers = HashMap<String, (u64, oneshot::Sender<()>)>;

/// Timeout handler utility for async operations
#[derive(Clone)]
pub struct TimeoutHandler {
    default_timeout: Duration,
    pending: Arc<Mutex<PendingTimers>>,
    next_token: Arc<AtomicU64>,
}

impl TimeoutHandler {
    pub fn new(config: &TimeoutConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(&TimeoutConfig::default())
    }

    /// Execute with the configured default timeout.
    pub async fn execute_default<F, T>(&self, operation: F, operation_id: &str) -> TimedResult<T>
    where
        F: Future<Output = SchedulerResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.execute(operation, self.default_timeout, operation_id)
            .await
    }

    /// Race `operation` against `timeout`.
    ///
    /// `operation_id` must be unique among operations tracked at the same time
    /// for [`cancel_operation`](Self::cancel_operation) to reach the right timer.
    pub async fn execute<F, T>(
        &self,
        operation: F,
        timeout: Duration,
        operation_id: &str,
    ) -> TimedResult<T>
    where
        F: Future<Output = SchedulerResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        if self
            .lock_pending()
            .insert(operation_id.to_string(), (token, cancel_tx))
            .is_some()
        {
            warn!(
                operation_id,
                "operation id reused while a previous timer was tracked"
            );
        }

        let mut handle = tokio::spawn(operation);
        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        let mut timer_armed = true;
        let mut cancel_open = true;

        let outcome = loop {
            tokio::select! {
                joined = &mut handle => {
                    break match joined {
                        Ok(result) => result,
                        Err(join_error) => Err(SchedulerError::Internal(format!(
                            "operation '{operation_id}' aborted: {join_error}"
                        ))),
                    };
                }
                _ = &mut sleep, if timer_armed => {
                    warn!(
                        operation_id,
                        timeout = ?timeout,
                        "operation timed out; it keeps running but its result will be discarded"
                    );
                    break Err(SchedulerError::Timeout {
                        operation_id: operation_id.to_string(),
                        timeout,
                    });
                }
                signal = &mut cancel_rx, if cancel_open => {
                    cancel_open = false;
                    // a dropped sender means the entry was replaced, not cancelled
                    if signal.is_ok() {
                        debug!(operation_id, "timeout cancelled, waiting for completion");
                        timer_armed = false;
                    }
                }
            }
        };

        {
            let mut pending = self.lock_pending();
            if matches!(pending.get(operation_id), Some((t, _)) if *t == token) {
                pending.remove(operation_id);
            }
        }

        let duration = start.elapsed();
        if let Err(e) = &outcome {
            if !e.is_timeout() {
                error!(operation_id, duration = ?duration, "operation failed: {}", e);
            }
        } else {
            debug!(operation_id, duration = ?duration, "operation completed");
        }

        TimedResult {
            operation_id: operation_id.to_string(),
            outcome,
            duration,
        }
    }

    /// Disarm the timer of a tracked operation. The caller then waits for the
    /// operation however long it takes.
    pub fn cancel_operation(&self, operation_id: &str) -> bool {
        match self.lock_pending().remove(operation_id) {
            Some((_, cancel)) => cancel.send(()).is_ok(),
            None => false,
        }
    }

    /// Disarm every tracked timer; returns how many were disarmed.
    pub fn cancel_all_operations(&self) -> usize {
        let drained: Vec<_> = self
            .lock_pending()
            .drain()
            .map(|(_, (_, cancel))| cancel)
            .collect();
        drained
            .into_iter()
            .filter_map(|cancel| cancel.send(()).ok())
            .count()
    }

    pub fn pending_operations(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingTimers> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
