pub mod metrics_source;
pub mod sampler;
pub mod transport;

pub use metrics_source::{MetricsSource, SystemMetrics};
pub use sampler::{CpuSampler, MemorySample, MemorySampler};
pub use transport::PublishTransport;
