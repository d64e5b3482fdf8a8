//! Field-level encoding (protobuf-compatible, proto3 rules).
//!
//! Parsing rules:
//! - Never index raw buffers; every read is preceded by a `remaining()` check.
//! - Length prefixes are validated before slicing, so a hostile frame can
//!   only produce `MalformedMessage`, never a panic or an oversized copy.
//! - Default-valued scalars are omitted on encode and restored on decode.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ProtocolError, Result};

/// Longest legal varint (64 bits / 7 bits per byte).
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(ProtocolError::MalformedMessage(format!(
                "unsupported wire type {other}"
            ))),
        }
    }
}

pub fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn get_varint(buf: &mut Bytes) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedMessage("truncated varint".into()));
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::MalformedMessage("varint longer than 10 bytes".into()))
}

/// A decoded field value, typed by wire type only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Varint(u64),
    Fixed64(u64),
    Bytes(Bytes),
    Fixed32(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub number: u32,
    pub value: FieldValue,
}

impl Field {
    fn mismatch(&self, expected: &str) -> ProtocolError {
        ProtocolError::MalformedMessage(format!(
            "field {} should be {expected}, got {:?}",
            self.number,
            self.value_kind()
        ))
    }

    fn value_kind(&self) -> WireType {
        match self.value {
            FieldValue::Varint(_) => WireType::Varint,
            FieldValue::Fixed64(_) => WireType::Fixed64,
            FieldValue::Bytes(_) => WireType::LengthDelimited,
            FieldValue::Fixed32(_) => WireType::Fixed32,
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self.value {
            FieldValue::Varint(v) => Ok(v),
            _ => Err(self.mismatch("varint")),
        }
    }

    /// Two's-complement `int64` (negative values use all ten bytes).
    pub fn as_i64(&self) -> Result<i64> {
        self.as_u64().map(|v| v as i64)
    }

    pub fn as_u32(&self) -> Result<u32> {
        let v = self.as_u64()?;
        u32::try_from(v).map_err(|_| {
            ProtocolError::MalformedMessage(format!("field {} out of u32 range: {v}", self.number))
        })
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.as_u64().map(|v| v != 0)
    }

    pub fn as_fixed32(&self) -> Result<u32> {
        match self.value {
            FieldValue::Fixed32(v) => Ok(v),
            _ => Err(self.mismatch("fixed32")),
        }
    }

    pub fn as_bytes(&self) -> Result<Bytes> {
        match &self.value {
            FieldValue::Bytes(b) => Ok(b.clone()),
            _ => Err(self.mismatch("length-delimited")),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            ProtocolError::MalformedMessage(format!("field {} is not valid UTF-8", self.number))
        })
    }
}

/// Sequential field reader over one encoded message.
pub struct FieldReader {
    buf: Bytes,
}

impl FieldReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Next field, or `None` at the end of the message.
    pub fn next_field(&mut self) -> Result<Option<Field>> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }

        let key = get_varint(&mut self.buf)?;
        let number = u32::try_from(key >> 3)
            .ok()
            .filter(|n| *n != 0)
            .ok_or_else(|| ProtocolError::MalformedMessage(format!("invalid field key {key}")))?;
        let wire_type = WireType::from_bits(key & 0x07)?;

        let value = match wire_type {
            WireType::Varint => FieldValue::Varint(get_varint(&mut self.buf)?),
            WireType::Fixed64 => {
                if self.buf.remaining() < 8 {
                    return Err(ProtocolError::MalformedMessage("truncated fixed64".into()));
                }
                FieldValue::Fixed64(self.buf.get_u64_le())
            }
            WireType::Fixed32 => {
                if self.buf.remaining() < 4 {
                    return Err(ProtocolError::MalformedMessage("truncated fixed32".into()));
                }
                FieldValue::Fixed32(self.buf.get_u32_le())
            }
            WireType::LengthDelimited => {
                let len = get_varint(&mut self.buf)?;
                let len = usize::try_from(len)
                    .ok()
                    .filter(|len| *len <= self.buf.remaining())
                    .ok_or_else(|| {
                        ProtocolError::MalformedMessage(format!(
                            "field {number}: length {len} exceeds {} remaining bytes",
                            self.buf.remaining()
                        ))
                    })?;
                FieldValue::Bytes(self.buf.copy_to_bytes(len))
            }
        };

        Ok(Some(Field { number, value }))
    }
}

/// Field writer that follows proto3 default omission.
#[derive(Default)]
pub struct FieldWriter {
    buf: BytesMut,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, number: u32, wire_type: WireType) {
        put_varint(&mut self.buf, (u64::from(number) << 3) | wire_type as u64);
    }

    pub fn uint64(&mut self, number: u32, value: u64) -> &mut Self {
        if value != 0 {
            self.key(number, WireType::Varint);
            put_varint(&mut self.buf, value);
        }
        self
    }

    pub fn int64(&mut self, number: u32, value: i64) -> &mut Self {
        self.uint64(number, value as u64)
    }

    pub fn bool(&mut self, number: u32, value: bool) -> &mut Self {
        self.uint64(number, u64::from(value))
    }

    pub fn fixed32(&mut self, number: u32, value: u32) -> &mut Self {
        if value != 0 {
            self.key(number, WireType::Fixed32);
            self.buf.put_u32_le(value);
        }
        self
    }

    pub fn bytes(&mut self, number: u32, value: &[u8]) -> &mut Self {
        if !value.is_empty() {
            self.embedded(number, value);
        }
        self
    }

    pub fn string(&mut self, number: u32, value: &str) -> &mut Self {
        self.bytes(number, value.as_bytes())
    }

    /// Length-delimited value written even when empty (repeated entries).
    pub fn embedded(&mut self, number: u32, value: &[u8]) -> &mut Self {
        self.key(number, WireType::LengthDelimited);
        put_varint(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
