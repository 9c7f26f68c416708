pub mod app_config;
pub mod orchestrator;
pub mod publisher;
pub mod runtime;
pub mod vitals;

pub use app_config::AppConfig;
pub use orchestrator::OrchestratorConfig;
pub use publisher::PublisherConfig;
pub use runtime::{MemoryConfig, ObservabilityConfig, TimeoutConfig};
pub use vitals::VitalsConfig;
