//! Engine error type.

use harbor_common::HarborError;
use harbor_net::NetError;
use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Error, Debug)]
pub enum SwError {
    /// Fetch rejected or timed out.
    #[error("Network error: {0}")]
    Network(#[from] NetError),

    /// A manifest entry could not be fetched during install.
    #[error("Install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid control message: {0}")]
    InvalidMessage(String),

    #[error("State error: {0}")]
    State(String),

    #[error(transparent)]
    Common(#[from] HarborError),
}

impl SwError {
    /// True for rejected or timed-out fetches, which cache or synthesis can recover.
    pub fn is_network(&self) -> bool {
        matches!(self, SwError::Network(_))
    }
}

/// Result type alias for engine operations.
pub type SwResult<T> = std::result::Result<T, SwError>;
