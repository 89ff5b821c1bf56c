//! # signprep common library
//!
//! Shared code for the signprep workspace:
//! - Error type used across crates
//! - Configuration loading (TOML bootstrap file, environment, CLI overrides)
//! - Retry policy for external tool invocations

pub mod config;
pub mod error;

pub use config::{ConfigOverrides, PipelineConfig, RetryPolicy, TomlConfig};
pub use error::{Error, Result};
