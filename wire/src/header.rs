//! Payload header types and constants.

use bitstream::{BitReader, BitWriter};

use crate::error::{DecodeError, WireResult};

/// Magic number identifying crysync payloads.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: u32 = 0x4353_594E; // "CSYN" in ASCII

/// Current wire format version.
pub const VERSION: u16 = 1;

/// Header size in bytes: magic(4) + version(2) + context(1).
pub const HEADER_SIZE: usize = 4 + 2 + 1;

/// The purpose a sync pass serves.
///
/// The codec never branches on it; synchronized objects do (e.g. skipping
/// transient fields when saving).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SyncContext {
    SaveGame = 0,
    #[default]
    Network = 1,
    Custom = 2,
}

impl SyncContext {
    /// Parses a context from its raw byte.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::SaveGame),
            1 => Some(Self::Network),
            2 => Some(Self::Custom),
            _ => None,
        }
    }

    /// Returns the raw byte for this context.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

/// Payload header.
///
/// The magic number is validated during decoding and is not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Wire format version.
    pub version: u16,
    /// Context the payload was written under.
    pub context: SyncContext,
}

impl PayloadHeader {
    /// Creates a header for the current version.
    #[must_use]
    pub const fn new(context: SyncContext) -> Self {
        Self {
            version: VERSION,
            context,
        }
    }
}

/// Writes the header at the start of a payload.
pub fn encode_header(header: &PayloadHeader, writer: &mut BitWriter) {
    writer.write_u32_aligned(MAGIC);
    writer.write_u16_aligned(header.version);
    writer.write_u8_aligned(header.context.raw());
}

/// Reads and validates a payload header.
pub fn decode_header(reader: &mut BitReader<'_>) -> WireResult<PayloadHeader> {
    let available = reader.bits_remaining() / 8;
    if available < HEADER_SIZE {
        return Err(DecodeError::PayloadTooSmall {
            actual: available,
            required: HEADER_SIZE,
        });
    }

    let magic = reader.read_u32_aligned()?;
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }

    let version = reader.read_u16_aligned()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }

    let raw = reader.read_u8_aligned()?;
    let context = SyncContext::from_raw(raw).ok_or(DecodeError::UnknownContext { raw })?;

    Ok(PayloadHeader { version, context })
}
