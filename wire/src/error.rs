//! Error types for wire format operations.

use std::fmt;

use bitstream::BitError;
use thiserror::Error;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding a sync payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Payload is too small to contain the required header.
    #[error("payload too small: {actual} bytes, need at least {required}")]
    PayloadTooSmall { actual: usize, required: usize },

    /// Invalid magic number in the payload header.
    #[error("invalid magic number: 0x{found:08X}")]
    InvalidMagic { found: u32 },

    /// Unsupported wire version.
    #[error("unsupported wire version: {found}")]
    UnsupportedVersion { found: u16 },

    /// Unknown sync context byte.
    #[error("unknown sync context: {raw}")]
    UnknownContext { raw: u8 },

    /// Unknown record tag encountered.
    #[error("unknown record tag: {tag}")]
    UnknownRecordTag { tag: u8 },

    /// Unknown field value kind encountered.
    #[error("unknown value kind: {kind}")]
    UnknownValueKind { kind: u8 },

    /// A narrow integer value did not fit its declared kind.
    #[error("{kind} value out of range")]
    ValueOutOfRange { kind: &'static str },

    /// A record carried an empty name.
    #[error("empty record name at byte {offset}")]
    EmptyName { offset: usize },

    /// A name or string value was not valid UTF-8.
    #[error("invalid utf-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// A group end appeared with no group open.
    #[error("group end without matching begin at byte {offset}")]
    UnbalancedGroupEnd { offset: usize },

    /// The payload ended while groups were still open.
    #[error("payload ended with {depth} unterminated group(s)")]
    UnterminatedGroup { depth: usize },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Underlying bitstream error.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitError),
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    PayloadBytes,
    RecordCount,
    NameLength,
    GroupDepth,
    BlobLength,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PayloadBytes => "payload bytes",
            Self::RecordCount => "record count",
            Self::NameLength => "name length",
            Self::GroupDepth => "group depth",
            Self::BlobLength => "blob length",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while encoding a sync payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A name or blob is longer than the length prefix can express.
    #[error("length overflow: {length}")]
    LengthOverflow { length: usize },
}
