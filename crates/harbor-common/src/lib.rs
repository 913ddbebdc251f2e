//! # Harbor Common
//!
//! Shared error type, logging configuration and timeout helper for the
//! Harbor offline caching engine.

use std::time::Duration;
use thiserror::Error;

pub mod logging;
pub mod timeout;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use timeout::with_timeout;

/// Errors shared across Harbor crates.
#[derive(Error, Debug)]
pub enum HarborError {
    /// Invalid or unreadable configuration.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A bounded operation did not finish in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl HarborError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias for Harbor operations.
pub type Result<T> = std::result::Result<T, HarborError>;
