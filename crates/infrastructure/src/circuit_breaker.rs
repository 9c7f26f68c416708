//! Per-operation circuit breaker
//!
//! The breaker isolates one failing operation (usually one scheduled task) so
//! that repeated failures stop it from being invoked until a recovery window
//! has elapsed. Time is read from `tokio::time::Instant` so recovery windows
//! follow the runtime clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sentinel_core::{CircuitBreakerConfig, CircuitState, SchedulerError, SchedulerResult};

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub last_failure: Option<Instant>,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
}

impl CircuitBreakerStats {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold: config.failure_threshold,
            recovery_timeout: config.recovery_timeout,
            last_failure: None,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64
        }
    }

    /// Time left before an open breaker admits a trial call.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        if self.state != CircuitState::Open {
            return None;
        }
        let elapsed = self.last_failure.map(|at| at.elapsed())?;
        Some(self.recovery_timeout.saturating_sub(elapsed))
    }
}

/// Circuit breaker implementation
///
/// `closed --failure x threshold--> open --cooldown elapsed + is_open()--> half-open`;
/// a success closes it again, a failure during the trial re-opens it at once
/// because the failure count is still at or above the threshold.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    stats: Arc<RwLock<CircuitBreakerStats>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let stats = CircuitBreakerStats::new(&config);
        Self {
            name: name.into(),
            config,
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Liveness check that doubles as the open -> half-open transition.
    ///
    /// Returns `false` for closed and half-open breakers. For an open breaker
    /// whose last failure is older than the recovery timeout it moves the
    /// breaker to half-open and returns `false`, granting one trial; otherwise
    /// it returns `true`. Calling it is therefore not side-effect free.
    pub async fn is_open(&self) -> bool {
        let mut stats = self.stats.write().await;

        match stats.state {
            CircuitState::Closed | CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let cooled_down = stats
                    .last_failure
                    .map_or(true, |at| at.elapsed() > self.config.recovery_timeout);

                if cooled_down {
                    stats.state = CircuitState::HalfOpen;
                    info!(
                        breaker = %self.name,
                        failure_count = stats.failure_count,
                        "circuit breaker half-open, allowing trial call"
                    );
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Full reset: failure count to zero, state to closed.
    pub async fn record_success(&self) {
        let mut stats = self.stats.write().await;

        stats.total_calls += 1;
        stats.successful_calls += 1;
        stats.failure_count = 0;

        if stats.state != CircuitState::Closed {
            info!(breaker = %self.name, "circuit breaker closed");
        }
        stats.state = CircuitState::Closed;
    }

    /// Partial heal used by the orchestrator: one success removes one failure
    /// from the streak instead of clearing it. A half-open trial that succeeds
    /// still closes the breaker.
    pub async fn record_partial_success(&self) {
        let mut stats = self.stats.write().await;

        stats.total_calls += 1;
        stats.successful_calls += 1;
        stats.failure_count = stats.failure_count.saturating_sub(1);

        if stats.state == CircuitState::HalfOpen {
            stats.state = CircuitState::Closed;
            info!(
                breaker = %self.name,
                failure_count = stats.failure_count,
                "half-open trial succeeded, circuit breaker closed"
            );
        }
    }

    pub async fn record_failure(&self) {
        let mut stats = self.stats.write().await;

        stats.total_calls += 1;
        stats.failed_calls += 1;
        stats.failure_count += 1;
        stats.last_failure = Some(Instant::now());

        if stats.failure_count >= self.config.failure_threshold {
            if stats.state != CircuitState::Open {
                warn!(
                    breaker = %self.name,
                    failure_count = stats.failure_count,
                    threshold = self.config.failure_threshold,
                    recovery_timeout = ?self.config.recovery_timeout,
                    "circuit breaker opened"
                );
            }
            stats.state = CircuitState::Open;
        } else {
            debug!(
                breaker = %self.name,
                failure_count = stats.failure_count,
                threshold = self.config.failure_threshold,
                "failure recorded"
            );
        }
    }

    /// Execute operation with circuit breaker protection
    pub async fn execute<F, Fut, T>(&self, operation: F) -> SchedulerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SchedulerResult<T>>,
    {
        if self.is_open().await {
            self.stats.write().await.rejected_calls += 1;
            return Err(SchedulerError::CircuitOpen {
                name: self.name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(error) => {
                self.record_failure().await;
                Err(error)
            }
        }
    }

    /// Current state without triggering the half-open transition.
    pub async fn state(&self) -> CircuitState {
        self.stats.read().await.state
    }

    pub async fn failure_count(&self) -> u32 {
        self.stats.read().await.failure_count
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        self.stats.read().await.clone()
    }

    pub async fn reset(&self) {
        let mut stats = self.stats.write().await;
        *stats = CircuitBreakerStats::new(&self.config);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
