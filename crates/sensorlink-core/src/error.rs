//! Error types for the sensor codecs.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Error type for schema and packet codecs.
///
/// Construction errors (`SchemaValidation`, `UnsupportedEncoding`,
/// `SchemaDecode`, `SchemaEncode`) abort building a codec. The remaining
/// variants describe a single packet or call and leave the codec usable.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A channel descriptor violates the rules of its encoding kind
    #[error("Schema validation error on channel '{channel}': {reason}")]
    SchemaValidation { channel: String, reason: String },

    /// Unaligned bit width or unknown encoding code
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Malformed schema bytes
    #[error("Schema decode error: {0}")]
    SchemaDecode(String),

    /// The schema model cannot be represented on the wire
    #[error("Schema encode error: {0}")]
    SchemaEncode(String),

    /// Malformed data packet bytes
    #[error("Packet decode error: {0}")]
    PacketDecode(String),

    /// Values cannot be encoded against the schema
    #[error("Packet encode error on channel '{channel}': {reason}")]
    PacketEncode { channel: String, reason: String },

    /// Operation is not allowed in the current state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Raw payload does not match the fixed packet layout
    #[error("Raw data should be {expected} bytes, is {actual} bytes")]
    RawLengthMismatch { expected: usize, actual: usize },

    /// Record file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn validation(channel: &str, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(channel: &str, reason: impl Into<String>) -> Self {
        Self::PacketEncode {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error happened while building a codec.
    ///
    /// A construction error makes the whole schema unusable, while any
    /// other error only affects the packet or call that raised it.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation { .. }
                | Self::UnsupportedEncoding(_)
                | Self::SchemaDecode(_)
                | Self::SchemaEncode(_)
        )
    }
}
