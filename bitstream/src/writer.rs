//! Growable byte-aligned writer.

/// A writer backed by a growable buffer.
///
/// Every value starts on a byte boundary. Fixed-width integers and floats are
/// little-endian; varints use 7-bit groups with zigzag for signed values.
/// Writing never fails; length checks belong to the format on top.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_u8_aligned(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Writes a `u16` (little-endian).
    pub fn write_u16_aligned(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `u32` (little-endian).
    pub fn write_u32_aligned(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `u64` (little-endian).
    pub fn write_u64_aligned(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an `f32` as its IEEE-754 bits (little-endian).
    pub fn write_f32_aligned(&mut self, value: f32) {
        self.write_u32_aligned(value.to_bits());
    }

    /// Writes an `f64` as its IEEE-754 bits (little-endian).
    pub fn write_f64_aligned(&mut self, value: f64) {
        self.write_u64_aligned(value.to_bits());
    }

    pub fn write_varu32(&mut self, value: u32) {
        self.write_varu64(u64::from(value));
    }

    /// Writes a zigzag varint `i32`.
    pub fn write_vars32(&mut self, value: i32) {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_varu32(zigzag);
    }

    /// Writes a varint `u64`, seven bits per byte, low group first.
    pub fn write_varu64(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    /// Writes a zigzag varint `i64`.
    pub fn write_vars64(&mut self, value: i64) {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_varu64(zigzag);
    }

    /// Writes raw bytes.
    pub fn write_bytes_aligned(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
