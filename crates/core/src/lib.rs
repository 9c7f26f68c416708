pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{
    AppConfig, CircuitBreakerConfig, CircuitState, ConfigValidator, LoadGateConfig, MemoryConfig,
    ObservabilityConfig, OrchestratorConfig, PublisherConfig, TimeoutConfig, VitalsConfig,
};
pub use errors::*;
pub use lifecycle::LifecycleRegistry;
pub use logging::{init_logging, LogConfig, LogLevel, OutputFormat};
pub use models::{BatchOperation, SkipReason, TaskEvent, TaskPriority, TaskStatus};
pub use traits::{
    CpuSampler, MemorySample, MemorySampler, MetricsSource, PublishTransport, SystemMetrics,
};
