//! Schema-driven message body decoding and its projections.
//!
//! The body of an identified message is walked field-by-field against the
//! ordered descriptors from the message-definition database, producing an
//! intermediate tree of typed values. From that tree two projections are
//! derived on demand: a flat binary record with a fixed per-message size
//! (variable arrays zero-padded to capacity, suitable for struct overlay)
//! and a JSON object keyed by the schema's element names.

use log::trace;
use serde_json::{Map, Value};

use crate::message_db::{BaseType, FieldDescriptor, MessageDatabase, MessageDef, Storage};
use crate::{Error, Result};

/// Satellite identifier: PRN or slot, plus a signed GLONASS frequency
/// channel. Serialized in ASCII as `prn`, `prn+chan` or `prn-chan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SatelliteId {
    /// PRN number or slot.
    pub prn: u16,
    /// Frequency channel; 0 for systems without one.
    pub freq_channel: i16,
}

impl SatelliteId {
    /// ASCII form: the sign of the channel is always written.
    #[must_use]
    pub fn to_ascii(&self) -> String {
        if self.freq_channel == 0 {
            self.prn.to_string()
        } else {
            format!("{}{:+}", self.prn, self.freq_channel)
        }
    }

    /// Parse the ASCII form.
    pub fn parse(token: &str) -> Result<Self> {
        let bad = || Error::InvalidMessage(format!("bad satellite id {token:?}"));
        // Skip position 0 so a leading sign is not taken for a channel.
        let split = token
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '+' || c == '-')
            .map(|(i, _)| i);
        match split {
            None => Ok(SatelliteId {
                prn: token.parse().map_err(|_| bad())?,
                freq_channel: 0,
            }),
            Some(i) => Ok(SatelliteId {
                prn: token[..i].parse().map_err(|_| bad())?,
                freq_channel: token[i..].parse().map_err(|_| bad())?,
            }),
        }
    }
}

/// One decoded field. Arrays hold scalars; class arrays hold one value
/// sequence per iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Unsigned 8-bit.
    U8(u8),
    /// Signed 8-bit.
    I8(i8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 16-bit.
    I16(i16),
    /// Unsigned 32-bit. Also carries enum-storage values.
    U32(u32),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 64-bit.
    I64(i64),
    /// IEEE 754 single.
    F32(f32),
    /// IEEE 754 double.
    F64(f64),
    /// Boolean.
    Bool(bool),
    /// Single character.
    Char(u8),
    /// Unsigned 32-bit rendered as hex in text forms.
    HexU32(u32),
    /// Satellite PRN plus frequency channel.
    SatelliteId(SatelliteId),
    /// NUL-terminated string field.
    Str(String),
    /// Fixed or variable array of scalars, at runtime length.
    Array(Vec<FieldValue>),
    /// Class array: one value sequence per iteration.
    ClassArray(Vec<Vec<FieldValue>>),
}

/// The intermediate message: one entry per value-bearing schema field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedBody {
    /// Top-level field values, in schema order. `CLASS` markers contribute
    /// no entry; their children appear as ordinary fields.
    pub fields: Vec<FieldValue>,
}

struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let s = self
            .buf
            .get(self.pos..self.pos + n)
            .ok_or(Error::UnexpectedEndOfMessage)?;
        self.pos += n;
        Ok(s)
    }

    fn u32(&mut self) -> Result<u32> {
        let b: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| Error::UnexpectedEndOfMessage)?;
        Ok(u32::from_le_bytes(b))
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

fn uint_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn int_le(bytes: &[u8]) -> i64 {
    let raw = uint_le(bytes);
    let bits = bytes.len() * 8;
    if bits == 0 || bits >= 64 {
        raw as i64
    } else {
        // Sign extend from the element width.
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}

fn decode_scalar(base: BaseType, bytes: &[u8]) -> Result<FieldValue> {
    Ok(match base {
        BaseType::U8 => FieldValue::U8(uint_le(bytes) as u8),
        BaseType::I8 => FieldValue::I8(int_le(bytes) as i8),
        BaseType::U16 => FieldValue::U16(uint_le(bytes) as u16),
        BaseType::I16 => FieldValue::I16(int_le(bytes) as i16),
        BaseType::U32 => FieldValue::U32(uint_le(bytes) as u32),
        BaseType::I32 => FieldValue::I32(int_le(bytes) as i32),
        BaseType::U64 => FieldValue::U64(uint_le(bytes)),
        BaseType::I64 => FieldValue::I64(int_le(bytes)),
        BaseType::F32 => {
            let b: [u8; 4] = bytes.try_into().map_err(|_| Error::UnexpectedEndOfMessage)?;
            FieldValue::F32(f32::from_le_bytes(b))
        }
        BaseType::F64 => {
            let b: [u8; 8] = bytes.try_into().map_err(|_| Error::UnexpectedEndOfMessage)?;
            FieldValue::F64(f64::from_le_bytes(b))
        }
        BaseType::Bool => FieldValue::Bool(uint_le(bytes) != 0),
        BaseType::Char => FieldValue::Char(uint_le(bytes) as u8),
        BaseType::HexU32 => FieldValue::HexU32(uint_le(bytes) as u32),
        BaseType::SatelliteId => {
            let b: [u8; 4] = bytes.try_into().map_err(|_| Error::UnexpectedEndOfMessage)?;
            FieldValue::SatelliteId(SatelliteId {
                prn: u16::from_le_bytes([b[0], b[1]]),
                freq_channel: i16::from_le_bytes([b[2], b[3]]),
            })
        }
    })
}

struct TokenCursor<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn next(&mut self) -> Result<&'a str> {
        let t = self
            .tokens
            .get(self.pos)
            .ok_or(Error::UnexpectedEndOfMessage)?;
        self.pos += 1;
        Ok(t)
    }
}

fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(token)
}

fn parse_scalar_token(base: BaseType, token: &str) -> Result<FieldValue> {
    let bad = |what: &str| Error::InvalidMessage(format!("bad {what} field: {token:?}"));
    Ok(match base {
        BaseType::U8 => FieldValue::U8(token.parse().map_err(|_| bad("U8"))?),
        BaseType::I8 => FieldValue::I8(token.parse().map_err(|_| bad("I8"))?),
        BaseType::U16 => FieldValue::U16(token.parse().map_err(|_| bad("U16"))?),
        BaseType::I16 => FieldValue::I16(token.parse().map_err(|_| bad("I16"))?),
        BaseType::U32 => FieldValue::U32(token.parse().map_err(|_| bad("U32"))?),
        BaseType::I32 => FieldValue::I32(token.parse().map_err(|_| bad("I32"))?),
        BaseType::U64 => FieldValue::U64(token.parse().map_err(|_| bad("U64"))?),
        BaseType::I64 => FieldValue::I64(token.parse().map_err(|_| bad("I64"))?),
        BaseType::F32 => FieldValue::F32(token.parse().map_err(|_| bad("F32"))?),
        BaseType::F64 => FieldValue::F64(token.parse().map_err(|_| bad("F64"))?),
        BaseType::Bool => match token {
            "TRUE" => FieldValue::Bool(true),
            "FALSE" => FieldValue::Bool(false),
            _ => FieldValue::Bool(token.parse::<u32>().map_err(|_| bad("BOOL"))? != 0),
        },
        BaseType::Char => FieldValue::Char(*unquote(token).as_bytes().first().unwrap_or(&0)),
        BaseType::HexU32 => FieldValue::HexU32(
            u32::from_str_radix(token.trim_start_matches("0x"), 16).map_err(|_| bad("HEX"))?,
        ),
        BaseType::SatelliteId => FieldValue::SatelliteId(SatelliteId::parse(token)?),
    })
}

/// Walks one message's descriptor list over binary or ASCII bodies.
pub struct BodyDecoder<'a> {
    db: &'a MessageDatabase,
    def: &'a MessageDef,
}

impl<'a> BodyDecoder<'a> {
    /// Bind a decoder to one message definition.
    #[must_use]
    pub fn new(db: &'a MessageDatabase, def: &'a MessageDef) -> Self {
        Self { db, def }
    }

    /// Decode a binary body (the bytes between header and CRC trailer).
    pub fn decode_binary(&self, body: &[u8]) -> Result<DecodedBody> {
        let mut cur = ByteCursor { buf: body, pos: 0 };
        let fields = self.decode_binary_fields(&self.def.fields, &mut cur)?;
        if !cur.remaining().is_empty() {
            trace!(
                "{}: {} trailing body bytes not covered by schema",
                self.def.name,
                cur.remaining().len()
            );
        }
        Ok(DecodedBody { fields })
    }

    fn decode_binary_fields(
        &self,
        descs: &[FieldDescriptor],
        cur: &mut ByteCursor,
    ) -> Result<Vec<FieldValue>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < descs.len() {
            let d = &descs[i];
            match d.storage {
                Storage::Class => i += 1,
                Storage::ClassArray => {
                    let count = cur.u32()? as usize;
                    let children = class_children(descs, i)?;
                    let mut elems = Vec::new();
                    for _ in 0..count {
                        elems.push(self.decode_binary_fields(children, cur)?);
                    }
                    out.push(FieldValue::ClassArray(elems));
                    i += 1 + d.child_count;
                }
                _ => {
                    out.push(self.decode_binary_field(d, cur)?);
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    fn decode_binary_field(&self, d: &FieldDescriptor, cur: &mut ByteCursor) -> Result<FieldValue> {
        match d.storage {
            Storage::Simple | Storage::Enum => decode_scalar(d.base_type, cur.take(d.element_size)?),
            Storage::FixedArray => {
                let mut elems = Vec::with_capacity(d.array_length);
                for _ in 0..d.array_length {
                    elems.push(decode_scalar(d.base_type, cur.take(d.element_size)?)?);
                }
                Ok(FieldValue::Array(elems))
            }
            Storage::VarArray => {
                let count = cur.u32()? as usize;
                if count > d.array_length {
                    return Err(Error::InvalidMessage(format!(
                        "{}: runtime length {} exceeds capacity {}",
                        d.name, count, d.array_length
                    )));
                }
                let mut elems = Vec::new();
                for _ in 0..count {
                    elems.push(decode_scalar(d.base_type, cur.take(d.element_size)?)?);
                }
                Ok(FieldValue::Array(elems))
            }
            Storage::String => {
                let view = cur.remaining();
                let limit = d.array_length.min(view.len());
                let nul = view[..limit]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| {
                        Error::InvalidMessage(format!("{}: unterminated string", d.name))
                    })?;
                let s = String::from_utf8_lossy(&view[..nul]).into_owned();
                // Wire pads the terminator out to 4-byte alignment.
                cur.take(nul + (4 - nul % 4))?;
                Ok(FieldValue::Str(s))
            }
            Storage::Class | Storage::ClassArray => unreachable!("handled by the field walk"),
        }
    }

    /// Decode an ASCII body: the comma-separated fields between the header
    /// terminator `;` and the CRC separator `*`.
    pub fn decode_ascii(&self, body: &str) -> Result<DecodedBody> {
        let tokens: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split(',').collect()
        };
        let mut cur = TokenCursor {
            tokens: &tokens,
            pos: 0,
        };
        let fields = self.decode_ascii_fields(&self.def.fields, &mut cur)?;
        if cur.pos != tokens.len() {
            trace!(
                "{}: {} trailing ASCII fields not covered by schema",
                self.def.name,
                tokens.len() - cur.pos
            );
        }
        Ok(DecodedBody { fields })
    }

    fn decode_ascii_fields(
        &self,
        descs: &[FieldDescriptor],
        cur: &mut TokenCursor,
    ) -> Result<Vec<FieldValue>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < descs.len() {
            let d = &descs[i];
            match d.storage {
                Storage::Class => i += 1,
                Storage::ClassArray => {
                    let count: usize = cur.next()?.parse().map_err(|_| {
                        Error::InvalidMessage(format!("{}: bad iteration count", d.name))
                    })?;
                    let children = class_children(descs, i)?;
                    let mut elems = Vec::new();
                    for _ in 0..count {
                        elems.push(self.decode_ascii_fields(children, cur)?);
                    }
                    out.push(FieldValue::ClassArray(elems));
                    i += 1 + d.child_count;
                }
                _ => {
                    out.push(self.decode_ascii_field(d, cur)?);
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    fn decode_ascii_field(&self, d: &FieldDescriptor, cur: &mut TokenCursor) -> Result<FieldValue> {
        match d.storage {
            Storage::Simple => parse_scalar_token(d.base_type, cur.next()?),
            Storage::Enum => {
                let token = cur.next()?;
                let value = d
                    .enum_ref
                    .as_ref()
                    .and_then(|r| self.db.enum_by_ref(r))
                    .and_then(|dict| dict.value_of(token));
                match value {
                    Some(v) => Ok(FieldValue::U32(v)),
                    // Tolerate numeric enum values from older firmware.
                    None => token.parse().map(FieldValue::U32).map_err(|_| {
                        Error::InvalidMessage(format!("{}: unknown enum value {token:?}", d.name))
                    }),
                }
            }
            Storage::FixedArray if d.base_type == BaseType::Char => {
                let mut elems: Vec<FieldValue> = unquote(cur.next()?)
                    .bytes()
                    .take(d.array_length)
                    .map(FieldValue::Char)
                    .collect();
                elems.resize(d.array_length, FieldValue::Char(0));
                Ok(FieldValue::Array(elems))
            }
            Storage::FixedArray => {
                let mut elems = Vec::with_capacity(d.array_length);
                for _ in 0..d.array_length {
                    elems.push(parse_scalar_token(d.base_type, cur.next()?)?);
                }
                Ok(FieldValue::Array(elems))
            }
            Storage::VarArray => {
                let count: usize = cur.next()?.parse().map_err(|_| {
                    Error::InvalidMessage(format!("{}: bad array length", d.name))
                })?;
                if count > d.array_length {
                    return Err(Error::InvalidMessage(format!(
                        "{}: runtime length {} exceeds capacity {}",
                        d.name, count, d.array_length
                    )));
                }
                let mut elems = Vec::new();
                for _ in 0..count {
                    elems.push(parse_scalar_token(d.base_type, cur.next()?)?);
                }
                Ok(FieldValue::Array(elems))
            }
            Storage::String => Ok(FieldValue::Str(unquote(cur.next()?).to_string())),
            Storage::Class | Storage::ClassArray => unreachable!("handled by the field walk"),
        }
    }
}

pub(crate) fn class_children<'d>(
    descs: &'d [FieldDescriptor],
    i: usize,
) -> Result<&'d [FieldDescriptor]> {
    let d = &descs[i];
    descs.get(i + 1..i + 1 + d.child_count).ok_or_else(|| {
        Error::InvalidMessage(format!(
            "{}: class array claims {} children past the descriptor list",
            d.name, d.child_count
        ))
    })
}

fn push_uint(v: u64, size: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes()[..size.min(8)]);
}

pub(crate) fn scalar_bytes(d: &FieldDescriptor, v: &FieldValue, out: &mut Vec<u8>) -> Result<()> {
    let size = d.element_size;
    match v {
        FieldValue::U8(x) => push_uint(u64::from(*x), size, out),
        FieldValue::I8(x) => push_uint(*x as u64, size, out),
        FieldValue::U16(x) => push_uint(u64::from(*x), size, out),
        FieldValue::I16(x) => push_uint(*x as u64, size, out),
        FieldValue::U32(x) => push_uint(u64::from(*x), size, out),
        FieldValue::I32(x) => push_uint(*x as u64, size, out),
        FieldValue::U64(x) => push_uint(*x, size, out),
        FieldValue::I64(x) => push_uint(*x as u64, size, out),
        FieldValue::F32(x) => out.extend_from_slice(&x.to_le_bytes()),
        FieldValue::F64(x) => out.extend_from_slice(&x.to_le_bytes()),
        FieldValue::Bool(x) => push_uint(u64::from(*x), size, out),
        FieldValue::Char(x) => push_uint(u64::from(*x), size, out),
        FieldValue::HexU32(x) => push_uint(u64::from(*x), size, out),
        FieldValue::SatelliteId(s) => {
            out.extend_from_slice(&s.prn.to_le_bytes());
            out.extend_from_slice(&s.freq_channel.to_le_bytes());
        }
        FieldValue::Str(_) | FieldValue::Array(_) | FieldValue::ClassArray(_) => {
            return Err(Error::InvalidMessage(format!(
                "{}: container value where scalar expected",
                d.name
            )));
        }
    }
    Ok(())
}

impl DecodedBody {
    /// Flat binary projection: a fixed-size record per message. Variable
    /// arrays keep their length prefix but are zero-padded out to capacity;
    /// strings are NUL-padded to capacity.
    pub fn flatten(&self, def: &MessageDef) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        flatten_fields(&def.fields, &self.fields, &mut out)?;
        Ok(out)
    }

    /// JSON projection: one object per message, keys taken from the last
    /// dot-segment of each descriptor name, enum values symbolic.
    pub fn to_json(&self, def: &MessageDef, db: &MessageDatabase) -> Result<Value> {
        let mut obj = Map::new();
        json_fields(&def.fields, &self.fields, db, &mut obj)?;
        Ok(Value::Object(obj))
    }

    /// JSON projection serialized to text.
    pub fn to_json_string(&self, def: &MessageDef, db: &MessageDatabase) -> Result<String> {
        Ok(self.to_json(def, db)?.to_string())
    }
}

/// Walk descriptors and values together, calling `each` for every
/// value-bearing descriptor. `CLASS` markers are skipped; `CLASS_ARRAY`
/// recursion is the caller's business, so it gets the whole descriptor
/// window.
pub(crate) fn walk<'d, 'v, F>(
    descs: &'d [FieldDescriptor],
    values: &'v [FieldValue],
    mut each: F,
) -> Result<()>
where
    F: FnMut(&'d FieldDescriptor, &'d [FieldDescriptor], &'v FieldValue) -> Result<()>,
{
    let mut i = 0;
    let mut vi = 0;
    while i < descs.len() {
        let d = &descs[i];
        if d.storage == Storage::Class {
            i += 1;
            continue;
        }
        let v = values.get(vi).ok_or_else(|| {
            Error::InvalidMessage(format!("{}: missing value for field", d.name))
        })?;
        if d.storage == Storage::ClassArray {
            each(d, class_children(descs, i)?, v)?;
            i += 1 + d.child_count;
        } else {
            each(d, &[], v)?;
            i += 1;
        }
        vi += 1;
    }
    Ok(())
}

fn flatten_fields(
    descs: &[FieldDescriptor],
    values: &[FieldValue],
    out: &mut Vec<u8>,
) -> Result<()> {
    walk(descs, values, |d, children, v| match (d.storage, v) {
        (Storage::ClassArray, FieldValue::ClassArray(elems)) => {
            out.extend_from_slice(&(elems.len() as u32).to_le_bytes());
            for e in elems {
                flatten_fields(children, e, out)?;
            }
            Ok(())
        }
        (Storage::Simple | Storage::Enum, v) => scalar_bytes(d, v, out),
        (Storage::FixedArray, FieldValue::Array(elems)) => {
            for e in elems {
                scalar_bytes(d, e, out)?;
            }
            let missing = d.array_length.saturating_sub(elems.len());
            out.extend(std::iter::repeat_n(0u8, missing * d.element_size));
            Ok(())
        }
        (Storage::VarArray, FieldValue::Array(elems)) => {
            out.extend_from_slice(&(elems.len() as u32).to_le_bytes());
            for e in elems {
                scalar_bytes(d, e, out)?;
            }
            let missing = d.array_length.saturating_sub(elems.len());
            out.extend(std::iter::repeat_n(0u8, missing * d.element_size));
            Ok(())
        }
        (Storage::String, FieldValue::Str(s)) => {
            if s.len() > d.array_length {
                return Err(Error::InvalidMessage(format!(
                    "{}: string longer than capacity",
                    d.name
                )));
            }
            out.extend_from_slice(s.as_bytes());
            out.extend(std::iter::repeat_n(0u8, d.array_length - s.len()));
            Ok(())
        }
        _ => Err(Error::InvalidMessage(format!(
            "{}: value shape does not match storage {:?}",
            d.name, d.storage
        ))),
    })
}

fn scalar_json(d: &FieldDescriptor, v: &FieldValue, db: &MessageDatabase) -> Result<Value> {
    if d.storage == Storage::Enum {
        if let FieldValue::U32(x) = v {
            let name = d
                .enum_ref
                .as_ref()
                .and_then(|r| db.enum_by_ref(r))
                .and_then(|dict| dict.name_of(*x));
            return Ok(match name {
                Some(n) => Value::from(n),
                None => Value::from(*x),
            });
        }
    }
    Ok(match v {
        FieldValue::U8(x) => Value::from(*x),
        FieldValue::I8(x) => Value::from(*x),
        FieldValue::U16(x) => Value::from(*x),
        FieldValue::I16(x) => Value::from(*x),
        FieldValue::U32(x) => Value::from(*x),
        FieldValue::I32(x) => Value::from(*x),
        FieldValue::U64(x) => Value::from(*x),
        FieldValue::I64(x) => Value::from(*x),
        FieldValue::F32(x) => Value::from(*x),
        FieldValue::F64(x) => Value::from(*x),
        FieldValue::Bool(x) => Value::from(if *x { "TRUE" } else { "FALSE" }),
        FieldValue::Char(x) => Value::from(*x),
        FieldValue::HexU32(x) => Value::from(format!("{x:x}")),
        FieldValue::SatelliteId(s) => Value::from(s.to_ascii()),
        FieldValue::Str(s) => Value::from(s.as_str()),
        FieldValue::Array(_) | FieldValue::ClassArray(_) => {
            return Err(Error::InvalidMessage(format!(
                "{}: container value where scalar expected",
                d.name
            )));
        }
    })
}

fn json_fields(
    descs: &[FieldDescriptor],
    values: &[FieldValue],
    db: &MessageDatabase,
    obj: &mut Map<String, Value>,
) -> Result<()> {
    walk(descs, values, |d, children, v| {
        let key = d.short_name().to_string();
        let value = match (d.storage, v) {
            (Storage::ClassArray, FieldValue::ClassArray(elems)) => {
                let mut arr = Vec::with_capacity(elems.len());
                for e in elems {
                    let mut elem_obj = Map::new();
                    json_fields(children, e, db, &mut elem_obj)?;
                    arr.push(Value::Object(elem_obj));
                }
                Value::Array(arr)
            }
            (Storage::FixedArray | Storage::VarArray, FieldValue::Array(elems)) => {
                if d.base_type == BaseType::Char {
                    // Character arrays read as text, NUL padding dropped.
                    let s: String = elems
                        .iter()
                        .filter_map(|e| match e {
                            FieldValue::Char(c) if *c != 0 => Some(char::from(*c)),
                            _ => None,
                        })
                        .collect();
                    Value::from(s)
                } else {
                    let mut arr = Vec::with_capacity(elems.len());
                    for e in elems {
                        arr.push(scalar_json(d, e, db)?);
                    }
                    Value::Array(arr)
                }
            }
            (_, v) => scalar_json(d, v, db)?,
        };
        obj.insert(key, value);
        Ok(())
    })
}
