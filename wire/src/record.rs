//! Record framing: typed field values and group markers.

use bitstream::{BitReader, BitWriter};

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::header::{decode_header, encode_header, PayloadHeader};
use crate::limits::Limits;

/// Record tags for version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordTag {
    Field = 1,
    GroupBegin = 2,
    GroupEnd = 3,
}

impl RecordTag {
    /// Parses a record tag from a raw byte.
    pub fn parse(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(Self::Field),
            2 => Ok(Self::GroupBegin),
            3 => Ok(Self::GroupEnd),
            _ => Err(DecodeError::UnknownRecordTag { tag }),
        }
    }
}

/// Kind byte stored in front of every field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Bool = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    U8 = 6,
    U16 = 7,
    U32 = 8,
    U64 = 9,
    F32 = 10,
    F64 = 11,
    Str = 12,
    Bytes = 13,
    Vec2 = 14,
    Vec3 = 15,
    Quat = 16,
}

impl ValueKind {
    /// Parses a value kind from a raw byte.
    pub fn parse(kind: u8) -> Result<Self, DecodeError> {
        Ok(match kind {
            1 => Self::Bool,
            2 => Self::I8,
            3 => Self::I16,
            4 => Self::I32,
            5 => Self::I64,
            6 => Self::U8,
            7 => Self::U16,
            8 => Self::U32,
            9 => Self::U64,
            10 => Self::F32,
            11 => Self::F64,
            12 => Self::Str,
            13 => Self::Bytes,
            14 => Self::Vec2,
            15 => Self::Vec3,
            16 => Self::Quat,
            _ => return Err(DecodeError::UnknownValueKind { kind }),
        })
    }

    /// Human-readable name, used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Quat => "quat",
        }
    }
}

/// A typed field value as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Quat([f32; 4]),
}

impl FieldValue {
    /// Returns the kind tag for this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::I8(_) => ValueKind::I8,
            Self::I16(_) => ValueKind::I16,
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::U8(_) => ValueKind::U8,
            Self::U16(_) => ValueKind::U16,
            Self::U32(_) => ValueKind::U32,
            Self::U64(_) => ValueKind::U64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Quat(_) => ValueKind::Quat,
        }
    }
}

/// One record of a sync payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Field { name: String, value: FieldValue },
    GroupBegin { name: String },
    GroupEnd,
}

/// A decoded sync payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePayload {
    pub header: PayloadHeader,
    pub records: Vec<Record>,
}

/// Encodes a header followed by `records`.
///
/// Group balance is the caller's responsibility; the decoder rejects
/// unbalanced payloads.
pub fn encode_payload(header: &PayloadHeader, records: &[Record]) -> Result<Vec<u8>, EncodeError> {
    let mut writer = BitWriter::with_capacity(64);
    encode_header(header, &mut writer);
    for record in records {
        encode_record(record, &mut writer)?;
    }
    Ok(writer.finish())
}

/// Appends a single record.
pub fn encode_record(record: &Record, writer: &mut BitWriter) -> Result<(), EncodeError> {
    match record {
        Record::Field { name, value } => {
            writer.write_u8_aligned(RecordTag::Field as u8);
            write_blob(writer, name.as_bytes())?;
            writer.write_u8_aligned(value.kind() as u8);
            write_value(writer, value)?;
        }
        Record::GroupBegin { name } => {
            writer.write_u8_aligned(RecordTag::GroupBegin as u8);
            write_blob(writer, name.as_bytes())?;
        }
        Record::GroupEnd => {
            writer.write_u8_aligned(RecordTag::GroupEnd as u8);
        }
    }
    Ok(())
}

fn write_blob(writer: &mut BitWriter, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| EncodeError::LengthOverflow {
        length: bytes.len(),
    })?;
    writer.write_varu32(len);
    writer.write_bytes_aligned(bytes);
    Ok(())
}

fn write_floats(writer: &mut BitWriter, values: &[f32]) {
    for value in values {
        writer.write_f32_aligned(*value);
    }
}

fn write_value(writer: &mut BitWriter, value: &FieldValue) -> Result<(), EncodeError> {
    match value {
        FieldValue::Bool(v) => writer.write_u8_aligned(u8::from(*v)),
        FieldValue::I8(v) => writer.write_vars32(i32::from(*v)),
        FieldValue::I16(v) => writer.write_vars32(i32::from(*v)),
        FieldValue::I32(v) => writer.write_vars32(*v),
        FieldValue::I64(v) => writer.write_vars64(*v),
        FieldValue::U8(v) => writer.write_u8_aligned(*v),
        FieldValue::U16(v) => writer.write_varu32(u32::from(*v)),
        FieldValue::U32(v) => writer.write_varu32(*v),
        FieldValue::U64(v) => writer.write_varu64(*v),
        FieldValue::F32(v) => writer.write_f32_aligned(*v),
        FieldValue::F64(v) => writer.write_f64_aligned(*v),
        FieldValue::Str(v) => write_blob(writer, v.as_bytes())?,
        FieldValue::Bytes(v) => write_blob(writer, v)?,
        FieldValue::Vec2(v) => write_floats(writer, v),
        FieldValue::Vec3(v) => write_floats(writer, v),
        FieldValue::Quat(v) => write_floats(writer, v),
    }
    Ok(())
}

/// Decodes a full payload, enforcing `limits` and group balance.
pub fn decode_payload(bytes: &[u8], limits: &Limits) -> WireResult<WirePayload> {
    if bytes.len() > limits.max_payload_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::PayloadBytes,
            limit: limits.max_payload_bytes,
            actual: bytes.len(),
        });
    }

    let mut reader = BitReader::new(bytes);
    let header = decode_header(&mut reader)?;

    let mut records = Vec::new();
    let mut depth = 0usize;
    while !reader.is_empty() {
        if records.len() == limits.max_records {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::RecordCount,
                limit: limits.max_records,
                actual: records.len() + 1,
            });
        }
        let offset = reader.bit_position() / 8;
        let record = match RecordTag::parse(reader.read_u8_aligned()?)? {
            RecordTag::Field => {
                let name = read_name(&mut reader, limits)?;
                let kind = ValueKind::parse(reader.read_u8_aligned()?)?;
                let value = read_value(&mut reader, kind, limits)?;
                Record::Field { name, value }
            }
            RecordTag::GroupBegin => {
                depth += 1;
                if depth > limits.max_group_depth {
                    return Err(DecodeError::LimitsExceeded {
                        kind: LimitKind::GroupDepth,
                        limit: limits.max_group_depth,
                        actual: depth,
                    });
                }
                let name = read_name(&mut reader, limits)?;
                Record::GroupBegin { name }
            }
            RecordTag::GroupEnd => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(DecodeError::UnbalancedGroupEnd { offset })?;
                Record::GroupEnd
            }
        };
        records.push(record);
    }

    if depth != 0 {
        return Err(DecodeError::UnterminatedGroup { depth });
    }

    Ok(WirePayload { header, records })
}

fn read_blob<'a>(
    reader: &mut BitReader<'a>,
    kind: LimitKind,
    limit: usize,
) -> WireResult<&'a [u8]> {
    let len = reader.read_varu32()? as usize;
    if len > limit {
        return Err(DecodeError::LimitsExceeded {
            kind,
            limit,
            actual: len,
        });
    }
    Ok(reader.read_bytes_aligned(len)?)
}

fn read_string(reader: &mut BitReader<'_>, kind: LimitKind, limit: usize) -> WireResult<String> {
    let offset = reader.bit_position() / 8;
    let bytes = read_blob(reader, kind, limit)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| DecodeError::InvalidUtf8 { offset })
}

fn read_name(reader: &mut BitReader<'_>, limits: &Limits) -> WireResult<String> {
    let offset = reader.bit_position() / 8;
    let name = read_string(reader, LimitKind::NameLength, limits.max_name_len)?;
    if name.is_empty() {
        return Err(DecodeError::EmptyName { offset });
    }
    Ok(name)
}

fn read_floats<const N: usize>(reader: &mut BitReader<'_>) -> WireResult<[f32; N]> {
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = reader.read_f32_aligned()?;
    }
    Ok(out)
}

fn read_value(reader: &mut BitReader<'_>, kind: ValueKind, limits: &Limits) -> WireResult<FieldValue> {
    let value = match kind {
        ValueKind::Bool => FieldValue::Bool(reader.read_u8_aligned()? != 0),
        ValueKind::I8 => FieldValue::I8(narrow(kind, reader.read_vars32()?)?),
        ValueKind::I16 => FieldValue::I16(narrow(kind, reader.read_vars32()?)?),
        ValueKind::I32 => FieldValue::I32(reader.read_vars32()?),
        ValueKind::I64 => FieldValue::I64(reader.read_vars64()?),
        ValueKind::U8 => FieldValue::U8(reader.read_u8_aligned()?),
        ValueKind::U16 => FieldValue::U16(narrow(kind, reader.read_varu32()?)?),
        ValueKind::U32 => FieldValue::U32(reader.read_varu32()?),
        ValueKind::U64 => FieldValue::U64(reader.read_varu64()?),
        ValueKind::F32 => FieldValue::F32(reader.read_f32_aligned()?),
        ValueKind::F64 => FieldValue::F64(reader.read_f64_aligned()?),
        ValueKind::Str => {
            FieldValue::Str(read_string(reader, LimitKind::BlobLength, limits.max_blob_len)?)
        }
        ValueKind::Bytes => FieldValue::Bytes(
            read_blob(reader, LimitKind::BlobLength, limits.max_blob_len)?.to_vec(),
        ),
        ValueKind::Vec2 => FieldValue::Vec2(read_floats(reader)?),
        ValueKind::Vec3 => FieldValue::Vec3(read_floats(reader)?),
        ValueKind::Quat => FieldValue::Quat(read_floats(reader)?),
    };
    Ok(value)
}

fn narrow<S, T: TryFrom<S>>(kind: ValueKind, value: S) -> WireResult<T> {
    T::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { kind: kind.name() })
}
