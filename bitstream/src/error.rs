//! Error types for bitstream operations.

use thiserror::Error;

/// Result type for bitstream operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Attempted to read past the end of the buffer.
    #[error("attempted to read {requested} bits but only {available} bits available")]
    UnexpectedEof {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// A varint ran past its maximum encoded length.
    #[error("invalid varint encoding")]
    InvalidVarint,
}
