//! # Sentinel Testing Utils
//!
//! Shared test doubles for the sentinel workspace. Everything here is an
//! in-memory implementation of a `sentinel-core` trait, so tests can drive
//! the orchestrator, publisher and vitals pipeline without Redis or procfs.
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! sentinel-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use sentinel_testing_utils::{FixedCpuSampler, InMemoryTransport};
//! ```

pub mod helpers;
pub mod mocks;

pub use helpers::*;
pub use mocks::*;
