//! Error types for the sensor client.

use sensorlink_core::CodecError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation is not allowed in the current state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Schema or packet codec error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The transport rejected a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}
