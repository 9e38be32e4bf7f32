//! Call destinations and channel identifiers.

use std::fmt;
use std::ops::BitOr;

use crate::error::{RmiError, RmiResult};

/// Network identifier of a networked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(u32);

impl EntityId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a peer connection. Valid channels are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(i32);

impl ChannelId {
    /// No channel.
    pub const NONE: Self = Self(-1);

    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::NONE
    }
}

/// Destination bitmask of a remote call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RmiTarget(u32);

impl RmiTarget {
    pub const NONE: Self = Self(0);
    /// A specific client, selected by channel.
    pub const TO_CLIENT_CHANNEL: Self = Self(0x01);
    /// The client owning the calling object.
    pub const TO_OWN_CLIENT: Self = Self(0x02);
    pub const TO_OTHER_CLIENTS: Self = Self(0x04);
    pub const TO_ALL_CLIENTS: Self = Self(0x08);
    pub const TO_SERVER: Self = Self(0x100);
    pub const NO_LOCAL_CALLS: Self = Self(0x1_0000);
    pub const NO_REMOTE_CALLS: Self = Self(0x2_0000);
    /// Send nowhere. Always rejected.
    pub const NO_CALL: Self = Self(Self::NO_LOCAL_CALLS.0 | Self::NO_REMOTE_CALLS.0);

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RmiTarget {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for RmiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(RmiTarget, &str); 7] = [
            (RmiTarget::TO_CLIENT_CHANNEL, "ToClientChannel"),
            (RmiTarget::TO_OWN_CLIENT, "ToOwnClient"),
            (RmiTarget::TO_OTHER_CLIENTS, "ToOtherClients"),
            (RmiTarget::TO_ALL_CLIENTS, "ToAllClients"),
            (RmiTarget::TO_SERVER, "ToServer"),
            (RmiTarget::NO_LOCAL_CALLS, "NoLocalCalls"),
            (RmiTarget::NO_REMOTE_CALLS, "NoRemoteCalls"),
        ];
        let mut rest = self.0;
        let mut first = true;
        f.write_str("RmiTarget(")?;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "0x{rest:X}")?;
        }
        f.write_str(")")
    }
}

/// Checks that `target` names a reachable destination for a call from an
/// object owned by `owner_channel`.
pub fn validate_target(
    target: RmiTarget,
    channel: ChannelId,
    owner_channel: ChannelId,
) -> RmiResult<()> {
    if target.contains(RmiTarget::NO_CALL) {
        return Err(RmiError::NoAllowedDestination);
    }
    if target.contains(RmiTarget::TO_CLIENT_CHANNEL) {
        if channel.raw() <= 0 {
            return Err(RmiError::ChannelNotSpecified {
                channel: channel.raw(),
            });
        }
        if target.contains(RmiTarget::TO_OWN_CLIENT) {
            return Err(RmiError::ChannelAndOwnClient);
        }
    }
    if target.contains(RmiTarget::TO_OWN_CLIENT) && !owner_channel.is_valid() {
        return Err(RmiError::NoOwnClient);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNED: ChannelId = ChannelId::new(3);

    #[test]
    fn bit_values() {
        assert_eq!(RmiTarget::TO_SERVER.raw(), 0x100);
        assert_eq!(RmiTarget::NO_CALL.raw(), 0x3_0000);
    }

    #[test]
    fn no_call_always_fails() {
        let target = RmiTarget::NO_CALL | RmiTarget::TO_SERVER;
        assert_eq!(
            validate_target(target, ChannelId::new(5), OWNED),
            Err(RmiError::NoAllowedDestination)
        );
    }

    #[test]
    fn single_locality_bit_is_allowed() {
        let target = RmiTarget::NO_LOCAL_CALLS | RmiTarget::TO_ALL_CLIENTS;
        assert_eq!(validate_target(target, ChannelId::NONE, OWNED), Ok(()));
    }

    #[test]
    fn client_channel_requires_channel() {
        for raw in [-1, 0] {
            assert_eq!(
                validate_target(RmiTarget::TO_CLIENT_CHANNEL, ChannelId::new(raw), OWNED),
                Err(RmiError::ChannelNotSpecified { channel: raw })
            );
        }
        assert_eq!(
            validate_target(RmiTarget::TO_CLIENT_CHANNEL, ChannelId::new(1), ChannelId::NONE),
            Ok(())
        );
    }

    #[test]
    fn client_channel_and_own_client_conflict() {
        let target = RmiTarget::TO_CLIENT_CHANNEL | RmiTarget::TO_OWN_CLIENT;
        assert_eq!(
            validate_target(target, ChannelId::new(2), OWNED),
            Err(RmiError::ChannelAndOwnClient)
        );
    }

    #[test]
    fn own_client_needs_owner() {
        assert_eq!(
            validate_target(RmiTarget::TO_OWN_CLIENT, ChannelId::NONE, ChannelId::NONE),
            Err(RmiError::NoOwnClient)
        );
        let target = RmiTarget::TO_ALL_CLIENTS | RmiTarget::TO_OWN_CLIENT;
        assert_eq!(validate_target(target, ChannelId::NONE, OWNED), Ok(()));
    }

    #[test]
    fn debug_names_bits() {
        let target = RmiTarget::TO_SERVER | RmiTarget::from_raw(0x40);
        assert_eq!(format!("{target:?}"), "RmiTarget(ToServer | 0x40)");
    }
}
