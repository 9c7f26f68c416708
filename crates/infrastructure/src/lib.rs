pub mod batch_publisher;
pub mod circuit_breaker;
pub mod load_gate;
pub mod memory_limiter;
pub mod redis_transport;
pub mod timeout_handler;

pub use batch_publisher::{BatchedPublisher, PublisherStats};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats};
pub use load_gate::{LoadGate, ProcStatCpuSampler};
pub use memory_limiter::{MemoryLimiter, MemoryStats, ProcessMemorySampler};
pub use redis_transport::RedisTransport;
pub use timeout_handler::{TimedResult, TimeoutHandler};
