//! Named-record payload format for crysync sync passes.
//!
//! A sync pass produces a flat sequence of records: typed fields addressed by
//! name, and begin/end markers for named groups. This crate encodes and
//! decodes that sequence. It does not know what the names mean; the
//! synchronized objects own the schema.
//!
//! # Design Principles
//!
//! - **Stable wire format** - The format is versioned; every byte layout is tested.
//! - **Bounded decoding** - All lengths and counts are validated against [`Limits`].
//! - **Balanced groups** - A decoded payload always has matching group markers.

mod error;
mod header;
mod limits;
mod record;

pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use header::{
    decode_header, encode_header, PayloadHeader, SyncContext, HEADER_SIZE, MAGIC, VERSION,
};
pub use limits::Limits;
pub use record::{
    decode_payload, encode_payload, encode_record, FieldValue, Record, RecordTag, ValueKind,
    WirePayload,
};
