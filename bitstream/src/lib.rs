//! Bounded byte packing primitives for crysync payloads.
//!
//! This crate provides [`BitWriter`] and [`BitReader`]. The sync record format
//! and the RMI payloads are built on top of it.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about aspects, groups or methods.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_u8_aligned(42);
//! writer.write_varu32(300);
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_u8_aligned().unwrap(), 42);
//! assert_eq!(reader.read_varu32().unwrap(), 300);
//! assert!(reader.is_empty());
//! ```

mod error;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use reader::BitReader;
pub use writer::BitWriter;
