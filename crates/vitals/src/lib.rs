//! Node vitals: composite health scoring and TTL-bound liveness snapshots.

pub mod health;
pub mod local_source;
pub mod publisher;
pub mod snapshot;

pub use health::{HealthClass, HealthScore};
pub use local_source::{ConnectionGauge, LocalMetricsSource};
pub use publisher::{VitalsPublisher, VITALS_TASK_ID};
pub use sentinel_core::{MetricsSource, SystemMetrics};
pub use snapshot::{LoadVector, Vitals, VitalsSnapshot};
