//! Registry client error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by registry RPCs.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry url: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected registry response {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),
}
