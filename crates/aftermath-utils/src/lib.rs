//! # Aftermath Utilities
//!
//! Shared utilities and logging for Aftermath.
//!
//! This crate provides common functionality used across the Aftermath workspace,
//! including logging infrastructure built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
