//! Configurable limits for bounded decoding.

/// Limits enforced while decoding a sync payload.
///
/// A payload comes from a remote peer, so every length and count is checked
/// against these bounds before memory is committed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum payload size in bytes.
    pub max_payload_bytes: usize,

    /// Maximum number of records (fields and group markers) in a payload.
    pub max_records: usize,

    /// Maximum length of a record name in bytes.
    pub max_name_len: usize,

    /// Maximum nesting depth of groups.
    pub max_group_depth: usize,

    /// Maximum length of a string or byte blob value.
    pub max_blob_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            max_records: 4096,
            max_name_len: 128,
            max_group_depth: 32,
            max_blob_len: 16 * 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_payload_bytes: 4096,
            max_records: 256,
            max_name_len: 32,
            max_group_depth: 8,
            max_blob_len: 1024,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_payload_bytes: usize::MAX,
            max_records: usize::MAX,
            max_name_len: usize::MAX,
            max_group_depth: usize::MAX,
            max_blob_len: usize::MAX,
        }
    }
}
