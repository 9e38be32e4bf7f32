//! Entity aspect masks, profiles and dirty tracking.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::error::{SyncError, SyncResult};

/// Bitmask of independently synchronizable state categories.
///
/// Bit 0 and the top three bits are reserved; [`EntityAspects::ALL`] still
/// covers every bit so it can be used as "everything" in masks, and
/// [`AspectTracker`] strips the reserved bits when marking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityAspects(u32);

impl EntityAspects {
    pub const NONE: Self = Self(0);
    pub const SCRIPT: Self = Self(0x0000_0002);
    pub const PHYSICS: Self = Self(0x0000_0008);
    pub const GAME_CLIENT_STATIC: Self = Self(0x0000_0010);
    pub const GAME_SERVER_STATIC: Self = Self(0x0000_0020);
    pub const GAME_CLIENT_DYNAMIC: Self = Self(0x0000_0040);
    pub const GAME_SERVER_DYNAMIC: Self = Self(0x0000_0080);
    pub const GAME_CLIENT_A: Self = Self(0x0000_0100);
    pub const GAME_SERVER_A: Self = Self(0x0000_0200);
    pub const GAME_CLIENT_B: Self = Self(0x0000_0400);
    pub const GAME_SERVER_B: Self = Self(0x0000_0800);
    pub const GAME_CLIENT_C: Self = Self(0x0000_1000);
    pub const GAME_SERVER_C: Self = Self(0x0000_2000);
    pub const GAME_CLIENT_D: Self = Self(0x0000_4000);
    pub const GAME_CLIENT_E: Self = Self(0x0000_8000);
    pub const GAME_CLIENT_F: Self = Self(0x0001_0000);
    pub const GAME_CLIENT_G: Self = Self(0x0002_0000);
    pub const GAME_CLIENT_H: Self = Self(0x0004_0000);
    pub const GAME_CLIENT_I: Self = Self(0x0008_0000);
    pub const GAME_CLIENT_J: Self = Self(0x0010_0000);
    pub const GAME_SERVER_D: Self = Self(0x0020_0000);
    pub const GAME_CLIENT_K: Self = Self(0x0040_0000);
    pub const GAME_CLIENT_L: Self = Self(0x0080_0000);
    pub const GAME_CLIENT_M: Self = Self(0x0100_0000);
    pub const GAME_CLIENT_N: Self = Self(0x0200_0000);
    pub const GAME_CLIENT_O: Self = Self(0x0400_0000);
    pub const GAME_CLIENT_P: Self = Self(0x0800_0000);
    pub const GAME_SERVER_E: Self = Self(0x1000_0000);
    pub const ALL: Self = Self(0xFFFF_FFFF);

    /// Bits that never denote an aspect.
    pub const RESERVED: Self = Self(0xE000_0001);

    /// Every bit that may denote an aspect.
    pub const USABLE: Self = Self(!Self::RESERVED.0);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Single-aspect mask for `index`, or `None` for reserved or out-of-range bits.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index >= 32 {
            return None;
        }
        let bit = 1u32 << index;
        if bit & Self::RESERVED.0 != 0 {
            return None;
        }
        Some(Self(bit))
    }

    /// Bit index of a single-aspect mask.
    #[must_use]
    pub const fn index(self) -> Option<u8> {
        if self.0.count_ones() == 1 {
            Some(self.0.trailing_zeros() as u8)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit of `other` is set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` for exactly one usable aspect bit.
    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0.count_ones() == 1 && self.0 & Self::RESERVED.0 == 0
    }

    /// Iterates the set usable bits in ascending order, one mask per bit.
    pub fn iter(self) -> impl Iterator<Item = Self> {
        let usable = self.0 & Self::USABLE.0;
        (0..32u8)
            .filter(move |index| usable & (1u32 << index) != 0)
            .map(|index| Self(1u32 << index))
    }

    /// Name of a single named aspect.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x0000_0002 => "Script",
            0x0000_0008 => "Physics",
            0x0000_0010 => "GameClientStatic",
            0x0000_0020 => "GameServerStatic",
            0x0000_0040 => "GameClientDynamic",
            0x0000_0080 => "GameServerDynamic",
            0x0000_0100 => "GameClientA",
            0x0000_0200 => "GameServerA",
            0x0000_0400 => "GameClientB",
            0x0000_0800 => "GameServerB",
            0x0000_1000 => "GameClientC",
            0x0000_2000 => "GameServerC",
            0x0000_4000 => "GameClientD",
            0x0000_8000 => "GameClientE",
            0x0001_0000 => "GameClientF",
            0x0002_0000 => "GameClientG",
            0x0004_0000 => "GameClientH",
            0x0008_0000 => "GameClientI",
            0x0010_0000 => "GameClientJ",
            0x0020_0000 => "GameServerD",
            0x0040_0000 => "GameClientK",
            0x0080_0000 => "GameClientL",
            0x0100_0000 => "GameClientM",
            0x0200_0000 => "GameClientN",
            0x0400_0000 => "GameClientO",
            0x0800_0000 => "GameClientP",
            0x1000_0000 => "GameServerE",
            _ => return None,
        })
    }
}

impl BitOr for EntityAspects {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityAspects {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EntityAspects {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for EntityAspects {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for EntityAspects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "EntityAspects({name})"),
            None => write!(f, "EntityAspects(0x{:08X})", self.0),
        }
    }
}

/// Serialization layout selector for an aspect (0-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile(u8);

impl Profile {
    pub const DEFAULT: Self = Self(0);
    pub const MAX: Self = Self(7);

    pub const fn new(raw: u8) -> SyncResult<Self> {
        if raw > Self::MAX.0 {
            return Err(SyncError::InvalidProfile { raw });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Dirty-aspect state of one networked object.
///
/// Game logic marks aspects dirty; the scheduler serializes them and clears
/// the bits it actually sent.
#[derive(Debug, Clone, Default)]
pub struct AspectTracker {
    dirty: EntityAspects,
    profiles: [Profile; 32],
}

impl AspectTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `aspects` dirty. Reserved bits are ignored.
    pub fn mark_dirty(&mut self, aspects: EntityAspects) {
        self.dirty |= aspects & EntityAspects::USABLE;
    }

    /// Currently dirty aspects.
    #[must_use]
    pub const fn dirty(&self) -> EntityAspects {
        self.dirty
    }

    #[must_use]
    pub const fn is_dirty(&self, aspects: EntityAspects) -> bool {
        self.dirty.intersects(aspects)
    }

    /// Clears `aspects`, typically after their payloads went out.
    pub fn clear(&mut self, aspects: EntityAspects) {
        self.dirty = self.dirty & !aspects;
    }

    /// Returns the dirty set and clears it.
    pub fn take_dirty(&mut self) -> EntityAspects {
        std::mem::take(&mut self.dirty)
    }

    /// Selects the serialization profile for a single aspect.
    pub fn set_profile(&mut self, aspect: EntityAspects, profile: Profile) -> SyncResult<()> {
        let index = single_index(aspect)?;
        self.profiles[index] = profile;
        Ok(())
    }

    /// Profile for a single aspect; the default profile for anything else.
    #[must_use]
    pub fn profile(&self, aspect: EntityAspects) -> Profile {
        single_index(aspect).map_or(Profile::DEFAULT, |index| self.profiles[index])
    }
}

fn single_index(aspect: EntityAspects) -> SyncResult<usize> {
    if !aspect.is_single() {
        return Err(SyncError::NotSingleAspect { bits: aspect.raw() });
    }
    Ok(aspect.raw().trailing_zeros() as usize)
}
