//! Composite health scoring
//!
//! Five sub-scores in `0..=1` are averaged into one overall score, which is
//! then bucketed into a [`HealthClass`] with fixed thresholds.

use std::fmt;

use serde::{Deserialize, Serialize};

use sentinel_core::SystemMetrics;

/// Connection count at which the connection sub-score saturates.
pub const CONNECTION_SATURATION: f64 = 100.0;
/// Latency (ms) at which the latency sub-score reaches zero.
pub const LATENCY_CEILING_MS: f64 = 1000.0;
/// Error rate (events/sec) at which the error sub-score reaches zero.
pub const ERROR_RATE_CEILING: f64 = 10.0;

/// Ordinal health classification, `Optimal` being the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthClass {
    Failing,
    Critical,
    Warning,
    Healthy,
    Optimal,
}

impl HealthClass {
    /// Evaluated high to low.
    pub fn classify(overall: f64) -> Self {
        if overall >= 0.9 {
            Self::Optimal
        } else if overall >= 0.7 {
            Self::Healthy
        } else if overall >= 0.5 {
            Self::Warning
        } else if overall >= 0.3 {
            Self::Critical
        } else {
            Self::Failing
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Failing => "failing",
        }
    }
}

impl fmt::Display for HealthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthScore {
    pub cpu: f64,
    pub memory: f64,
    pub connections: f64,
    pub latency: f64,
    pub errors: f64,
    pub overall: f64,
    pub class: HealthClass,
}

impl HealthScore {
    pub fn from_metrics(metrics: &SystemMetrics) -> Self {
        let cpu = unit(1.0 - metrics.cpu_usage);
        let memory = unit(1.0 - metrics.memory_usage);
        let connections = (metrics.connections as f64 / CONNECTION_SATURATION).min(1.0);
        let latency = (1.0 - metrics.latency_ms / LATENCY_CEILING_MS).max(0.0);
        let errors = 1.0 - (metrics.error_rate / ERROR_RATE_CEILING).clamp(0.0, 1.0);

        let overall = (cpu + memory + connections + latency + errors) / 5.0;

        Self {
            cpu,
            memory,
            connections,
            latency: unit(latency),
            errors,
            overall,
            class: HealthClass::classify(overall),
        }
    }
}

// usage figures from outside may stray past 0..=1
fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Metrics whose five sub-scores all equal `health`.
    fn uniform(health: f64) -> SystemMetrics {
        SystemMetrics {
            cpu_usage: 1.0 - health,
            memory_usage: 1.0 - health,
            connections: (health * CONNECTION_SATURATION).round() as u64,
            latency_ms: (1.0 - health) * LATENCY_CEILING_MS,
            error_rate: (1.0 - health) * ERROR_RATE_CEILING,
            storage_usage: 0.0,
        }
    }

    #[test]
    fn test_classification_bands() {
        let cases = [
            (0.95, HealthClass::Optimal),
            (0.75, HealthClass::Healthy),
            (0.55, HealthClass::Warning),
            (0.35, HealthClass::Critical),
            (0.10, HealthClass::Failing),
        ];
        for (health, expected) in cases {
            let score = HealthScore::from_metrics(&uniform(health));
            assert!((score.overall - health).abs() < 1e-9, "{health}");
            assert_eq!(score.class, expected, "{health}");
        }
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert_eq!(HealthClass::classify(0.9), HealthClass::Optimal);
        assert_eq!(HealthClass::classify(0.7), HealthClass::Healthy);
        assert_eq!(HealthClass::classify(0.5), HealthClass::Warning);
        assert_eq!(HealthClass::classify(0.3), HealthClass::Critical);
        assert_eq!(HealthClass::classify(0.2999), HealthClass::Failing);
    }

    #[test]
    fn test_sub_scores_saturate() {
        let score = HealthScore::from_metrics(&SystemMetrics {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            connections: 5000,
            latency_ms: 4000.0,
            error_rate: 250.0,
            storage_usage: 0.0,
        });
        assert_eq!(score.connections, 1.0);
        assert_eq!(score.latency, 0.0);
        assert_eq!(score.errors, 0.0);
        assert!((score.overall - 0.6).abs() < 1e-9);
        assert_eq!(score.class, HealthClass::Warning);
    }

    #[test]
    fn test_ordering_and_wire_names() {
        assert!(HealthClass::Optimal > HealthClass::Healthy);
        assert!(HealthClass::Critical > HealthClass::Failing);
        assert_eq!(
            serde_json::to_string(&HealthClass::Warning).unwrap(),
            "\"warning\""
        );
    }
}
