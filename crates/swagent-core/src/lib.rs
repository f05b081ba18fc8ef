//! Core types for swagent
//!
//! This crate provides the error type and configuration shared by the
//! contract, execution and session crates.

pub mod config;
pub mod error;

// Re-exports
pub use config::{
    ApiAuthConfig, ApiConfig, ContractConfig, KeyLocation, ObservabilityConfig, RetryConfig,
    SessionConfig, SwagentConfig,
};
pub use error::{Error, Result};
