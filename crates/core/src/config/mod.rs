//! Configuration sections and loading.

pub mod circuit_breaker;
pub mod models;
pub mod validation;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitState, LoadGateConfig};
pub use models::{
    AppConfig, MemoryConfig, ObservabilityConfig, OrchestratorConfig, PublisherConfig,
    TimeoutConfig, VitalsConfig,
};
pub use validation::ConfigValidator;
