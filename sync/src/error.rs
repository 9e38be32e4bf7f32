//! Error types for sync passes.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Local errors raised by a sync pass.
///
/// These indicate a bug in the synchronizing code (bad names, unbalanced
/// groups, using a medium in the wrong direction). Data that arrives
/// incomplete or mismatched from a peer is never reported here; it is logged
/// and flagged through partial reception instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A field or group name was empty or contained whitespace.
    #[error("invalid sync name {name:?}: must be non-empty and contain no whitespace")]
    InvalidName { name: String },

    /// A name exceeded the configured limit.
    #[error("sync name {name:?} is {len} bytes, limit is {limit}")]
    NameTooLong {
        name: String,
        len: usize,
        limit: usize,
    },

    /// A writing pass would produce a payload its receiver rejects.
    #[error("sync pass exceeds {kind} limit: {actual} > {limit}")]
    LimitExceeded {
        kind: wire::LimitKind,
        limit: usize,
        actual: usize,
    },

    /// The same name was written twice within one group.
    #[error("duplicate sync name {name:?} within group")]
    DuplicateName { name: String },

    /// `end_group` was called with no group open.
    #[error("end_group called with no open group")]
    UnbalancedGroup,

    /// A writing pass finished with groups still open.
    #[error("sync pass finished with {depth} open group(s)")]
    GroupsStillOpen { depth: usize },

    /// The operation is only meaningful in the other direction.
    #[error("{operation} is not available on a {direction} medium")]
    WrongDirection {
        operation: &'static str,
        direction: &'static str,
    },

    /// An aspect argument did not name exactly one usable aspect bit.
    #[error("expected a single aspect bit, got 0x{bits:08X}")]
    NotSingleAspect { bits: u32 },

    /// Profile selector outside 0-7.
    #[error("invalid profile {raw}, must be 0-7")]
    InvalidProfile { raw: u8 },

    /// Incoming payload could not be decoded.
    #[error("payload decode failed: {0}")]
    Decode(#[from] wire::DecodeError),

    /// Outgoing payload could not be encoded.
    #[error("payload encode failed: {0}")]
    Encode(#[from] wire::EncodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_name_display_quotes_name() {
        let err = SyncError::InvalidName {
            name: "bad name".to_owned(),
        };
        assert!(err.to_string().contains("\"bad name\""));
    }

    #[test]
    fn wrong_direction_display() {
        let err = SyncError::WrongDirection {
            operation: "finish",
            direction: "reading",
        };
        assert_eq!(
            err.to_string(),
            "finish is not available on a reading medium"
        );
    }

    #[test]
    fn limit_exceeded_display() {
        let err = SyncError::LimitExceeded {
            kind: wire::LimitKind::BlobLength,
            limit: 1024,
            actual: 2048,
        };
        assert_eq!(
            err.to_string(),
            "sync pass exceeds blob length limit: 2048 > 1024"
        );
    }

    #[test]
    fn decode_errors_convert() {
        let err: SyncError = wire::DecodeError::UnterminatedGroup { depth: 2 }.into();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
