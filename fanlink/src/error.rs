//! Common error types for fanlink.
//!
//! Each subsystem defines its own error enum next to the code that raises
//! it. This module holds the process-level errors: startup configuration,
//! I/O, and the API client.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for fanlink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API errors
    #[error("API error: {0}")]
    Api(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
