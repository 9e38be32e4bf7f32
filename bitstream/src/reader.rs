//! Bounds-checked reader over a borrowed buffer.

use crate::error::{BitError, BitResult};

/// Longest varint encoding of a `u64` in bytes.
const MAX_VARU64_BYTES: u32 = 10;

/// A reader for data produced by [`BitWriter`](crate::BitWriter).
///
/// Positions are counted in bits so errors line up with the writer's
/// accounting, but every read consumes whole bytes. All reads are
/// bounds-checked and the reader never panics on malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.data
            .len()
            .saturating_mul(8)
            .saturating_sub(self.bit_pos)
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    pub fn read_u8_aligned(&mut self) -> BitResult<u8> {
        let [byte] = self.read_aligned_array::<1>()?;
        Ok(byte)
    }

    /// Reads a byte-aligned `u16` (little-endian).
    pub fn read_u16_aligned(&mut self) -> BitResult<u16> {
        self.read_aligned_array().map(u16::from_le_bytes)
    }

    /// Reads a byte-aligned `u32` (little-endian).
    pub fn read_u32_aligned(&mut self) -> BitResult<u32> {
        self.read_aligned_array().map(u32::from_le_bytes)
    }

    /// Reads a byte-aligned `u64` (little-endian).
    pub fn read_u64_aligned(&mut self) -> BitResult<u64> {
        self.read_aligned_array().map(u64::from_le_bytes)
    }

    /// Reads a byte-aligned `f32`.
    pub fn read_f32_aligned(&mut self) -> BitResult<f32> {
        self.read_u32_aligned().map(f32::from_bits)
    }

    /// Reads a byte-aligned `f64`.
    pub fn read_f64_aligned(&mut self) -> BitResult<f64> {
        self.read_u64_aligned().map(f64::from_bits)
    }

    /// Reads a byte-aligned varint `u32`.
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let value = self.read_varu64()?;
        u32::try_from(value).map_err(|_| BitError::InvalidVarint)
    }

    /// Reads a byte-aligned zigzag varint `i32`.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let value = self.read_varu32()?;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    /// Reads a byte-aligned varint `u64`.
    pub fn read_varu64(&mut self) -> BitResult<u64> {
        let mut result = 0u64;
        for index in 0..MAX_VARU64_BYTES {
            let byte = self.read_u8_aligned()?;
            let payload = u64::from(byte & 0x7F);
            if index == MAX_VARU64_BYTES - 1 && payload > 1 {
                return Err(BitError::InvalidVarint);
            }
            result |= payload << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(BitError::InvalidVarint)
    }

    /// Reads a byte-aligned zigzag varint `i64`.
    pub fn read_vars64(&mut self) -> BitResult<i64> {
        let value = self.read_varu64()?;
        Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
    }

    /// Borrows the next `len` raw bytes.
    pub fn read_bytes_aligned(&mut self, len: usize) -> BitResult<&'a [u8]> {
        self.ensure_bits(len.saturating_mul(8))?;
        let start = self.bit_pos / 8;
        let bytes = &self.data[start..start + len];
        self.bit_pos += len * 8;
        Ok(bytes)
    }

    fn ensure_bits(&self, bits: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::UnexpectedEof {
                requested: bits,
                available,
            });
        }
        Ok(())
    }

    fn read_aligned_array<const N: usize>(&mut self) -> BitResult<[u8; N]> {
        let bytes = self.read_bytes_aligned(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}
