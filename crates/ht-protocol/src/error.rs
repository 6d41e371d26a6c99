//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or unframing stream data
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Header names a stream that does not exist
    #[error("Unknown stream type: {0}")]
    UnknownStream(u8),

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
