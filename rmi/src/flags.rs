//! Transfer semantics of a remote method and their packed form.
//!
//! Packed layout (one byte):
//!
//! | bits | meaning                                    |
//! |------|--------------------------------------------|
//! | 0-4  | attachment, one-hot                        |
//! | 5    | reliable                                   |
//! | 6    | to server                                  |
//! | 7    | low delay                                  |

use std::fmt;

use thiserror::Error;

/// Ordering of an RMI relative to the aspect sync of the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Attachment {
    /// Processed before the aspect sync of the sending object.
    PreAttach,
    /// Processed after the aspect sync of the sending object.
    PostAttach,
    /// No ordering relative to aspect sync.
    #[default]
    NoAttach,
    /// Processed before any aspect sync in the frame.
    Urgent,
    /// Unordered, and survives a flush of pending calls.
    Independent,
}

impl Attachment {
    pub const ALL: [Self; 5] = [
        Self::PreAttach,
        Self::PostAttach,
        Self::NoAttach,
        Self::Urgent,
        Self::Independent,
    ];

    const MASK: u8 = 0b1_1111;

    const fn bit(self) -> u8 {
        match self {
            Self::PreAttach => 0x01,
            Self::PostAttach => 0x02,
            Self::NoAttach => 0x04,
            Self::Urgent => 0x08,
            Self::Independent => 0x10,
        }
    }

    const fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0x01 => Some(Self::PreAttach),
            0x02 => Some(Self::PostAttach),
            0x04 => Some(Self::NoAttach),
            0x08 => Some(Self::Urgent),
            0x10 => Some(Self::Independent),
            _ => None,
        }
    }

    /// Whether calls with this attachment may be sent reliably.
    #[must_use]
    pub const fn allows_reliable(self) -> bool {
        !matches!(self, Self::PreAttach | Self::PostAttach)
    }

    /// Whether calls with this attachment may request low delay.
    #[must_use]
    pub const fn allows_low_delay(self) -> bool {
        !matches!(self, Self::Urgent | Self::Independent)
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreAttach => "pre-attach",
            Self::PostAttach => "post-attach",
            Self::NoAttach => "no-attach",
            Self::Urgent => "urgent",
            Self::Independent => "independent",
        };
        f.write_str(name)
    }
}

/// Corrections applied while normalizing a flag declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagCorrections {
    pub cleared_reliable: bool,
    pub cleared_low_delay: bool,
}

impl FlagCorrections {
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.cleared_reliable && !self.cleared_low_delay
    }
}

/// Errors raised when unpacking a flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlagDecodeError {
    #[error("flag byte 0x{raw:02X} has no attachment bit")]
    NoAttachment { raw: u8 },

    #[error("flag byte 0x{raw:02X} has more than one attachment bit")]
    MultipleAttachments { raw: u8 },

    #[error("reliable is not allowed with {attachment} attachment")]
    ReliableNotAllowed { attachment: Attachment },

    #[error("low delay is not allowed with {attachment} attachment")]
    LowDelayNotAllowed { attachment: Attachment },
}

/// Declared transfer semantics of a remote method.
///
/// Always normalized: `reliable` is never set together with pre/post
/// attachment and `low_delay` never together with urgent/independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RmiFlags {
    attachment: Attachment,
    reliable: bool,
    to_server: bool,
    low_delay: bool,
}

impl RmiFlags {
    const RELIABLE: u8 = 1 << 5;
    const TO_SERVER: u8 = 1 << 6;
    const LOW_DELAY: u8 = 1 << 7;

    /// Declares flags, clearing illegal combinations with a warning.
    #[must_use]
    pub fn new(attachment: Attachment, to_server: bool, low_delay: bool, reliable: bool) -> Self {
        let (flags, corrections) = Self::checked(attachment, to_server, low_delay, reliable);
        if corrections.cleared_reliable {
            tracing::warn!(%attachment, "reliable cleared: not allowed with this attachment");
        }
        if corrections.cleared_low_delay {
            tracing::warn!(%attachment, "low delay cleared: not allowed with this attachment");
        }
        flags
    }

    /// Declares flags and reports which requested bits were cleared.
    #[must_use]
    pub const fn checked(
        attachment: Attachment,
        to_server: bool,
        low_delay: bool,
        reliable: bool,
    ) -> (Self, FlagCorrections) {
        let cleared_reliable = reliable && !attachment.allows_reliable();
        let cleared_low_delay = low_delay && !attachment.allows_low_delay();
        (
            Self {
                attachment,
                reliable: reliable && !cleared_reliable,
                to_server,
                low_delay: low_delay && !cleared_low_delay,
            },
            FlagCorrections {
                cleared_reliable,
                cleared_low_delay,
            },
        )
    }

    #[must_use]
    pub const fn attachment(self) -> Attachment {
        self.attachment
    }

    #[must_use]
    pub const fn is_reliable(self) -> bool {
        self.reliable
    }

    #[must_use]
    pub const fn is_to_server(self) -> bool {
        self.to_server
    }

    #[must_use]
    pub const fn is_low_delay(self) -> bool {
        self.low_delay
    }

    /// Packs the flags into one byte.
    #[must_use]
    pub const fn encode(self) -> u8 {
        let mut raw = self.attachment.bit();
        if self.reliable {
            raw |= Self::RELIABLE;
        }
        if self.to_server {
            raw |= Self::TO_SERVER;
        }
        if self.low_delay {
            raw |= Self::LOW_DELAY;
        }
        raw
    }

    /// Unpacks a flag byte, rejecting anything [`RmiFlags::encode`] cannot
    /// produce.
    pub const fn decode(raw: u8) -> Result<Self, FlagDecodeError> {
        let bits = raw & Attachment::MASK;
        if bits == 0 {
            return Err(FlagDecodeError::NoAttachment { raw });
        }
        let Some(attachment) = Attachment::from_bit(bits) else {
            return Err(FlagDecodeError::MultipleAttachments { raw });
        };
        let reliable = raw & Self::RELIABLE != 0;
        let low_delay = raw & Self::LOW_DELAY != 0;
        if reliable && !attachment.allows_reliable() {
            return Err(FlagDecodeError::ReliableNotAllowed { attachment });
        }
        if low_delay && !attachment.allows_low_delay() {
            return Err(FlagDecodeError::LowDelayNotAllowed { attachment });
        }
        Ok(Self {
            attachment,
            reliable,
            to_server: raw & Self::TO_SERVER != 0,
            low_delay,
        })
    }
}

impl fmt::Display for RmiFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attachment)?;
        if self.reliable {
            f.write_str(" reliable")?;
        }
        if self.to_server {
            f.write_str(" to-server")?;
        }
        if self.low_delay {
            f.write_str(" low-delay")?;
        }
        Ok(())
    }
}
