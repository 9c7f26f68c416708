//! CPU-based advisory backpressure ("lazy mode").
//!
//! A gated task whose firing lands while the machine is busy is simply skipped;
//! it runs again at its next regular firing. Nothing is queued or retried.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use sentinel_core::{CpuSampler, LoadGateConfig, SkipReason};

/// Point sample of aggregate CPU utilisation from `/proc/stat`.
///
/// Computes `100 - idle / total * 100` over the cumulative tick counters of
/// all cores at the instant of the call. No I/O beyond reading procfs and no
/// windowing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcStatCpuSampler;

impl ProcStatCpuSampler {
    pub fn new() -> Self {
        Self
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`.
    pub fn parse_usage(stat: &str) -> Option<f64> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let ticks: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .filter_map(|v| v.parse().ok())
            .collect();

        if ticks.len() < 4 {
            return None;
        }

        let idle = ticks[3];
        let total: u64 = ticks.iter().sum();
        if total == 0 {
            return Some(0.0);
        }

        Some(100.0 - (idle as f64 / total as f64 * 100.0))
    }
}

impl CpuSampler for ProcStatCpuSampler {
    fn cpu_usage_percent(&self) -> f64 {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string("/proc/stat") {
                Ok(stat) => Self::parse_usage(&stat).unwrap_or(0.0),
                Err(e) => {
                    debug!("failed to read /proc/stat: {}", e);
                    0.0
                }
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            // no procfs; report idle so the gate never sheds on these hosts
            0.0
        }
    }
}

/// Per-task load gate
pub struct LoadGate {
    config: LoadGateConfig,
    sampler: Arc<dyn CpuSampler>,
    last_skip_reason: Mutex<Option<String>>,
}

impl LoadGate {
    pub fn new(config: LoadGateConfig, sampler: Arc<dyn CpuSampler>) -> Self {
        Self {
            config,
            sampler,
            last_skip_reason: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LoadGateConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Sample CPU now and decide whether the caller should skip this firing.
    /// A skip records a human-readable reason.
    pub fn should_skip(&self) -> Option<SkipReason> {
        if !self.config.enabled {
            return None;
        }

        let cpu_percent = self.sampler.cpu_usage_percent();
        if cpu_percent <= self.config.cpu_threshold_percent {
            return None;
        }

        let reason = SkipReason::HighLoad {
            cpu_percent,
            threshold_percent: self.config.cpu_threshold_percent,
        };
        warn!(
            cpu_percent,
            threshold_percent = self.config.cpu_threshold_percent,
            "load gate engaged"
        );
        *self
            .last_skip_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(reason.to_string());

        Some(reason)
    }

    pub fn last_skip_reason(&self) -> Option<String> {
        self.last_skip_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for LoadGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGate")
            .field("config", &self.config)
            .field("last_skip_reason", &self.last_skip_reason())
            .finish()
    }
}
