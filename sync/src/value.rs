//! Typed values that can travel through a sync medium.

use wire::{FieldValue, ValueKind};

/// A value with a direct wire representation.
///
/// Implemented for the primitive numeric types, `bool`, `String`, `Vec<u8>`
/// and the math types in this module.
pub trait SyncValue: Sized {
    /// Kind tag this type is stored under.
    const KIND: ValueKind;

    /// Converts the value into its wire form.
    fn to_field(&self) -> FieldValue;

    /// Extracts a value of this type, or `None` when the kinds differ.
    fn from_field(value: FieldValue) -> Option<Self>;
}

macro_rules! impl_sync_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl SyncValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn to_field(&self) -> FieldValue {
                    FieldValue::$variant(self.clone())
                }

                fn from_field(value: FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_sync_value! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
    Vec<u8> => Bytes,
}

/// Two-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn distance_sq(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SyncValue for Vec2 {
    const KIND: ValueKind = ValueKind::Vec2;

    fn to_field(&self) -> FieldValue {
        FieldValue::Vec2([self.x, self.y])
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Vec2([x, y]) => Some(Self::new(x, y)),
            _ => None,
        }
    }
}

impl SyncValue for Vec3 {
    const KIND: ValueKind = ValueKind::Vec3;

    fn to_field(&self) -> FieldValue {
        FieldValue::Vec3([self.x, self.y, self.z])
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Vec3([x, y, z]) => Some(Self::new(x, y, z)),
            _ => None,
        }
    }
}

impl SyncValue for Quat {
    const KIND: ValueKind = ValueKind::Quat;

    fn to_field(&self) -> FieldValue {
        FieldValue::Quat([self.x, self.y, self.z, self.w])
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Quat([x, y, z, w]) => Some(Self::new(x, y, z, w)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_kinds_match_fields() {
        assert_eq!(7u16.to_field().kind(), u16::KIND);
        assert_eq!(String::from("a").to_field().kind(), String::KIND);
        assert_eq!(Vec3::ONE.to_field().kind(), Vec3::KIND);
    }

    #[test]
    fn from_field_rejects_other_kinds() {
        assert_eq!(u32::from_field(FieldValue::U16(3)), None);
        assert_eq!(Vec2::from_field(FieldValue::Vec3([0.0; 3])), None);
        assert_eq!(i64::from_field(FieldValue::I64(-9)), Some(-9));
    }

    #[test]
    fn quat_defaults_to_identity() {
        assert_eq!(Quat::default(), Quat::IDENTITY);
        assert_eq!(
            Quat::from_field(Quat::IDENTITY.to_field()),
            Some(Quat::IDENTITY)
        );
    }

    #[test]
    fn vec3_distance() {
        assert_eq!(Vec3::ZERO.distance_sq(Vec3::new(1.0, 2.0, 2.0)), 9.0);
    }
}
