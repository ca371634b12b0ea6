//! Re-serialization of decoded messages into any wire format.
//!
//! One descriptor walk drives every output format; the format-specific
//! byte/text production sits behind the small [`Emitter`] capability, so a
//! new wire form needs a new emitter, not a new walker.

use crate::body::{self, DecodedBody, FieldValue};
use crate::crc::{block_crc32, nmea_checksum};
use crate::decoder::Message;
use crate::header::{
    ASCII_SYNC, BINARY_HEADER_LENGTH, BINARY_SYNC1, BINARY_SYNC2, BINARY_SYNC3, Header,
    SHORT_ASCII_SYNC, SHORT_BINARY_HEADER_LENGTH, SHORT_BINARY_SYNC3, WireFormat, ascii_wire_name,
};
use crate::message_db::{BaseType, FieldDescriptor, MessageDatabase, MessageDef, Storage};
use crate::{Error, Result};

/// Format-specific output production for one descriptor walk.
pub trait Emitter {
    /// Emit a var-array or class-array count prefix.
    fn count(&mut self, n: u32);
    /// Emit one scalar element.
    fn scalar(&mut self, d: &FieldDescriptor, v: &FieldValue) -> Result<()>;
    /// Emit a string field.
    fn string(&mut self, d: &FieldDescriptor, s: &str) -> Result<()>;
    /// Emit a fixed character array.
    fn fixed_char_array(&mut self, d: &FieldDescriptor, elems: &[FieldValue]) -> Result<()>;
}

#[derive(Default)]
struct BinaryEmitter {
    out: Vec<u8>,
}

impl Emitter for BinaryEmitter {
    fn count(&mut self, n: u32) {
        self.out.extend_from_slice(&n.to_le_bytes());
    }

    fn scalar(&mut self, d: &FieldDescriptor, v: &FieldValue) -> Result<()> {
        body::scalar_bytes(d, v, &mut self.out)
    }

    fn string(&mut self, d: &FieldDescriptor, s: &str) -> Result<()> {
        if s.len() >= d.array_length {
            return Err(Error::InvalidMessage(format!(
                "{}: string longer than capacity",
                d.name
            )));
        }
        self.out.extend_from_slice(s.as_bytes());
        // Terminator padded out to 4-byte alignment.
        self.out.extend(std::iter::repeat_n(0u8, 4 - s.len() % 4));
        Ok(())
    }

    fn fixed_char_array(&mut self, d: &FieldDescriptor, elems: &[FieldValue]) -> Result<()> {
        for e in elems {
            body::scalar_bytes(d, e, &mut self.out)?;
        }
        Ok(())
    }
}

struct AsciiEmitter<'db> {
    db: &'db MessageDatabase,
    tokens: Vec<String>,
}

impl AsciiEmitter<'_> {
    fn scalar_token(&self, d: &FieldDescriptor, v: &FieldValue) -> Result<String> {
        if d.storage == Storage::Enum {
            if let FieldValue::U32(x) = v {
                let name = d
                    .enum_ref
                    .as_ref()
                    .and_then(|r| self.db.enum_by_ref(r))
                    .and_then(|dict| dict.name_of(*x));
                return Ok(match name {
                    Some(n) => n.to_string(),
                    None => x.to_string(),
                });
            }
        }
        Ok(match v {
            FieldValue::U8(x) => x.to_string(),
            FieldValue::I8(x) => x.to_string(),
            FieldValue::U16(x) => x.to_string(),
            FieldValue::I16(x) => x.to_string(),
            FieldValue::U32(x) => x.to_string(),
            FieldValue::I32(x) => x.to_string(),
            FieldValue::U64(x) => x.to_string(),
            FieldValue::I64(x) => x.to_string(),
            FieldValue::F32(x) => x.to_string(),
            FieldValue::F64(x) => x.to_string(),
            FieldValue::Bool(x) => if *x { "TRUE" } else { "FALSE" }.to_string(),
            FieldValue::Char(x) => char::from(*x).to_string(),
            FieldValue::HexU32(x) => format!("{x:x}"),
            FieldValue::SatelliteId(s) => s.to_ascii(),
            FieldValue::Str(_) | FieldValue::Array(_) | FieldValue::ClassArray(_) => {
                return Err(Error::InvalidMessage(format!(
                    "{}: container value where scalar expected",
                    d.name
                )));
            }
        })
    }
}

impl Emitter for AsciiEmitter<'_> {
    fn count(&mut self, n: u32) {
        self.tokens.push(n.to_string());
    }

    fn scalar(&mut self, d: &FieldDescriptor, v: &FieldValue) -> Result<()> {
        let t = self.scalar_token(d, v)?;
        self.tokens.push(t);
        Ok(())
    }

    fn string(&mut self, _d: &FieldDescriptor, s: &str) -> Result<()> {
        self.tokens.push(format!("\"{s}\""));
        Ok(())
    }

    fn fixed_char_array(&mut self, _d: &FieldDescriptor, elems: &[FieldValue]) -> Result<()> {
        let s: String = elems
            .iter()
            .filter_map(|e| match e {
                FieldValue::Char(c) if *c != 0 => Some(char::from(*c)),
                _ => None,
            })
            .collect();
        self.tokens.push(format!("\"{s}\""));
        Ok(())
    }
}

/// Drive one emitter over a descriptor/value walk. Public so callers can
/// plug their own [`Emitter`] for additional wire forms.
pub fn emit_body<E: Emitter>(
    descs: &[FieldDescriptor],
    values: &[FieldValue],
    e: &mut E,
) -> Result<()> {
    body::walk(descs, values, |d, children, v| match (d.storage, v) {
        (Storage::ClassArray, FieldValue::ClassArray(elems)) => {
            e.count(elems.len() as u32);
            for el in elems {
                emit_body(children, el, e)?;
            }
            Ok(())
        }
        (Storage::Simple | Storage::Enum, v) => e.scalar(d, v),
        (Storage::FixedArray, FieldValue::Array(elems)) => {
            if elems.len() != d.array_length {
                return Err(Error::InvalidMessage(format!(
                    "{}: fixed array holds {} of {} elements",
                    d.name,
                    elems.len(),
                    d.array_length
                )));
            }
            if d.base_type == BaseType::Char {
                e.fixed_char_array(d, elems)
            } else {
                for el in elems {
                    e.scalar(d, el)?;
                }
                Ok(())
            }
        }
        (Storage::VarArray, FieldValue::Array(elems)) => {
            e.count(elems.len() as u32);
            for el in elems {
                e.scalar(d, el)?;
            }
            Ok(())
        }
        (Storage::String, FieldValue::Str(s)) => e.string(d, s),
        _ => Err(Error::InvalidMessage(format!(
            "{}: value shape does not match storage {:?}",
            d.name, d.storage
        ))),
    })
}

/// Serializes canonical headers plus decoded bodies back into wire bytes.
pub struct Encoder<'db> {
    db: &'db MessageDatabase,
}

impl<'db> Encoder<'db> {
    /// Create an encoder over a database.
    #[must_use]
    pub fn new(db: &'db MessageDatabase) -> Self {
        Self { db }
    }

    fn def_for(&self, header: &Header) -> Result<&'db MessageDef> {
        let by_name = if header.message_name.is_empty() {
            None
        } else {
            self.db.definition_by_name(&header.message_name)
        };
        by_name
            .or_else(|| self.db.definition_by_id(header.message_id))
            .ok_or_else(|| Error::UnknownMessage {
                message_id: header.message_id,
                name: header.message_name.clone(),
                raw: Vec::new(),
            })
    }

    /// Encode a header and body in the requested format.
    pub fn encode(
        &self,
        header: &Header,
        body: &DecodedBody,
        target: WireFormat,
    ) -> Result<Vec<u8>> {
        match target {
            WireFormat::Binary => self.encode_binary(header, body, false),
            WireFormat::ShortBinary => self.encode_binary(header, body, true),
            WireFormat::Ascii => self.encode_ascii(header, body, false),
            WireFormat::ShortAscii => self.encode_ascii(header, body, true),
            WireFormat::AbbrevAscii | WireFormat::Nmea | WireFormat::Unknown => {
                Err(Error::InvalidEncodeFormat {
                    name: header.message_name.clone(),
                    requested: target,
                })
            }
        }
    }

    /// Encode a decoded message in the requested format. Abbreviated-ASCII
    /// and NMEA messages only pass through in their own format; the NMEA
    /// checksum is recomputed.
    pub fn encode_message(&self, msg: &Message, target: WireFormat) -> Result<Vec<u8>> {
        let reject = || Error::InvalidEncodeFormat {
            name: msg.header.message_name.clone(),
            requested: target,
        };
        match (msg.header.format, target) {
            (WireFormat::AbbrevAscii, WireFormat::AbbrevAscii) => Ok(msg.raw.clone()),
            (WireFormat::Nmea, WireFormat::Nmea) => reencode_nmea(&msg.raw),
            (WireFormat::AbbrevAscii | WireFormat::Nmea, _) => Err(reject()),
            (_, WireFormat::AbbrevAscii | WireFormat::Nmea) => Err(reject()),
            _ => {
                let body = msg.body.as_ref().ok_or_else(reject)?;
                self.encode(&msg.header, body, target)
            }
        }
    }

    /// Encode into a caller-supplied buffer. Returns the frame length.
    pub fn encode_into(&self, msg: &Message, target: WireFormat, buf: &mut [u8]) -> Result<usize> {
        let bytes = self.encode_message(msg, target)?;
        if bytes.len() > buf.len() {
            return Err(Error::BufferFull {
                need: bytes.len(),
                have: buf.len(),
            });
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn encode_binary(&self, header: &Header, body: &DecodedBody, short: bool) -> Result<Vec<u8>> {
        let def = self.def_for(header)?;
        let mut be = BinaryEmitter::default();
        emit_body(&def.fields, &body.fields, &mut be)?;
        let body_bytes = be.out;

        let header_len = if short {
            SHORT_BINARY_HEADER_LENGTH
        } else {
            BINARY_HEADER_LENGTH
        };
        let mut frame = Vec::with_capacity(header_len + body_bytes.len() + 4);
        if short {
            let body_len: u8 = body_bytes.len().try_into().map_err(|_| {
                Error::InvalidEncodeFormat {
                    name: def.name.clone(),
                    requested: WireFormat::ShortBinary,
                }
            })?;
            frame.extend_from_slice(&[BINARY_SYNC1, BINARY_SYNC2, SHORT_BINARY_SYNC3, body_len]);
            frame.extend_from_slice(&def.message_id.to_le_bytes());
            frame.extend_from_slice(&header.week.to_le_bytes());
            frame.extend_from_slice(&header.milliseconds.to_le_bytes());
        } else {
            let body_len: u16 = body_bytes.len().try_into().map_err(|_| {
                Error::InvalidMessage(format!("{}: body too large for binary frame", def.name))
            })?;
            let mut msg_type = 0u8;
            if msg_type_secondary(header) {
                msg_type |= 0x01;
            }
            if header.is_response {
                msg_type |= 0x80;
            }
            frame.extend_from_slice(&[
                BINARY_SYNC1,
                BINARY_SYNC2,
                BINARY_SYNC3,
                BINARY_HEADER_LENGTH as u8,
            ]);
            frame.extend_from_slice(&def.message_id.to_le_bytes());
            frame.push(msg_type);
            frame.push(header.port.0);
            frame.extend_from_slice(&body_len.to_le_bytes());
            frame.extend_from_slice(&header.sequence.to_le_bytes());
            frame.push((header.idle_time_percent * 2.0) as u8);
            frame.push(header.time_status as u8);
            frame.extend_from_slice(&header.week.to_le_bytes());
            frame.extend_from_slice(&header.milliseconds.to_le_bytes());
            frame.extend_from_slice(&header.receiver_status.to_le_bytes());
            frame.extend_from_slice(&(header.message_def_crc as u16).to_le_bytes());
            frame.extend_from_slice(&header.receiver_sw_version.to_le_bytes());
        }
        frame.extend_from_slice(&body_bytes);
        let crc = block_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    fn encode_ascii(&self, header: &Header, body: &DecodedBody, short: bool) -> Result<Vec<u8>> {
        let def = self.def_for(header)?;
        let mut ae = AsciiEmitter {
            db: self.db,
            tokens: Vec::new(),
        };
        emit_body(&def.fields, &body.fields, &mut ae)?;
        let body_str = ae.tokens.join(",");

        let name = ascii_wire_name(header);
        let seconds = format!(
            "{}.{:03}",
            header.milliseconds / 1000,
            header.milliseconds % 1000
        );
        let head = if short {
            format!("{name},{},{seconds}", header.week)
        } else {
            format!(
                "{name},{},{},{:.1},{},{},{seconds},{:08x},{:x},{}",
                header.port.name(),
                header.sequence,
                header.idle_time_percent,
                header.time_status.name(),
                header.week,
                header.receiver_status,
                header.message_def_crc,
                header.receiver_sw_version,
            )
        };
        let inner = format!("{head};{body_str}");
        let crc = block_crc32(inner.as_bytes());
        let sync = if short {
            char::from(SHORT_ASCII_SYNC)
        } else {
            char::from(ASCII_SYNC)
        };
        Ok(format!("{sync}{inner}*{crc:08x}\r\n").into_bytes())
    }
}

fn msg_type_secondary(header: &Header) -> bool {
    header.antenna_source == crate::header::AntennaSource::Secondary
}

/// Rebuild an NMEA sentence around its payload, recomputing the checksum.
fn reencode_nmea(raw: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::InvalidMessage("NMEA frame is not valid UTF-8".into()))?;
    let start = text
        .find('$')
        .ok_or_else(|| Error::InvalidMessage("missing '$' sync".into()))?;
    let end = text
        .find('*')
        .ok_or_else(|| Error::InvalidMessage("missing '*' separator".into()))?;
    if end <= start {
        return Err(Error::InvalidMessage("'*' separator before sync".into()));
    }
    let inner = &text[start + 1..end];
    let sum = nmea_checksum(inner.as_bytes());
    Ok(format!("${inner}*{sum:02X}\r\n").into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDecoder;
    use crate::header::{AntennaSource, Port, TimeStatus, decode_header};

    const BINARY_FRAME: &[u8] = &[
        0xaa, 0x44, 0x12, 0x1c, 0x2a, 0x00, 0x00, 0x01, 0x15, 0x00, 0x00, 0x00, 0x90, 0xb4, 0x9d,
        0x07, 0x40, 0xd8, 0x5a, 0x19, 0x20, 0x00, 0x00, 0x02, 0x0a, 0xcb, 0x00, 0x80, 0x00, 0x00,
        0x00, 0x00, 0x90, 0xa0, 0xf8, 0x31, 0xe6, 0x8e, 0x49, 0x40, 0x1f, 0xf4, 0x6c, 0x56, 0x7d,
        0x82, 0x5c, 0xc0, 0x1e, 0xf4, 0x79, 0x87, 0x4e,
    ];

    const ASCII_FRAME: &[u8] = b"#TESTPOSA,COM1,0,72.0,FINESTEERING,1949,425384.000,02000020,cb0a,32768;SOL_COMPUTED,51.1164,-114.0389,30*e9b371d3\r\n";

    fn db() -> MessageDatabase {
        MessageDatabase::from_json_str(
            r#"{
              "enums": [
                { "name": "SolutionStatus",
                  "values": [ { "value": 0, "name": "SOL_COMPUTED" } ] }
              ],
              "messages": [
                { "name": "TESTPOS", "id": 42, "def_crc": 51978,
                  "fields": [
                    { "name": "TESTPOS.eMySolutionStatus",
                      "type": "SolutionStatus", "base_type": "U32",
                      "storage": "ENUM", "size": 4, "enum": "SolutionStatus" },
                    { "name": "TESTPOS.dMyLatitude", "type": "DOUBLE",
                      "base_type": "F64", "storage": "SIMPLE", "size": 8 },
                    { "name": "TESTPOS.dMyLongitude", "type": "DOUBLE",
                      "base_type": "F64", "storage": "SIMPLE", "size": 8 },
                    { "name": "TESTPOS.ucMyNumSVs", "type": "UCHAR",
                      "base_type": "U8", "storage": "SIMPLE", "size": 1 }
                  ] }
              ]
            }"#,
        )
        .unwrap()
    }

    fn decode_binary_frame(
        db: &MessageDatabase,
    ) -> crate::Result<(crate::header::Header, DecodedBody)> {
        let mut header = decode_header(WireFormat::Binary, BINARY_FRAME)?;
        let def = db.definition_by_id(header.message_id).unwrap();
        header.message_name = def.name.clone();
        let body_bytes = &BINARY_FRAME[BINARY_HEADER_LENGTH..BINARY_FRAME.len() - 4];
        let body = BodyDecoder::new(db, def).decode_binary(body_bytes)?;
        Ok((header, body))
    }

    #[test]
    fn binary_reencodes_bit_exact() -> crate::Result<()> {
        let db = db();
        let (header, body) = decode_binary_frame(&db)?;
        let out = Encoder::new(&db).encode(&header, &body, WireFormat::Binary)?;
        assert_eq!(out, BINARY_FRAME);
        Ok(())
    }

    #[test]
    fn binary_to_ascii() -> crate::Result<()> {
        let db = db();
        let (header, body) = decode_binary_frame(&db)?;
        let out = Encoder::new(&db).encode(&header, &body, WireFormat::Ascii)?;
        assert_eq!(out, ASCII_FRAME);
        Ok(())
    }

    #[test]
    fn ascii_to_binary() -> crate::Result<()> {
        let db = db();
        let mut header = decode_header(WireFormat::Ascii, ASCII_FRAME)?;
        let def = db.definition_by_name(&header.message_name).unwrap();
        header.message_id = def.message_id;
        let text = std::str::from_utf8(ASCII_FRAME).unwrap();
        let body_text = &text[text.find(';').unwrap() + 1..text.find('*').unwrap()];
        let body = BodyDecoder::new(&db, def).decode_ascii(body_text)?;

        let out = Encoder::new(&db).encode(&header, &body, WireFormat::Binary)?;
        assert_eq!(out, BINARY_FRAME);
        Ok(())
    }

    #[test]
    fn secondary_antenna_gets_suffix() -> crate::Result<()> {
        let db = db();
        let (mut header, body) = decode_binary_frame(&db)?;
        header.antenna_source = AntennaSource::Secondary;
        let out = Encoder::new(&db).encode(&header, &body, WireFormat::Ascii)?;
        assert!(out.starts_with(b"#TESTPOSA_1,"));
        Ok(())
    }

    #[test]
    fn short_ascii_header_shape() -> crate::Result<()> {
        let db = db();
        let (header, body) = decode_binary_frame(&db)?;
        let out = Encoder::new(&db).encode(&header, &body, WireFormat::ShortAscii)?;
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("%TESTPOSA,1949,425384.000;"));
        assert!(text.ends_with("\r\n"));
        Ok(())
    }

    #[test]
    fn unknown_message_is_rejected() {
        let db = db();
        let header = crate::header::Header {
            message_id: 999,
            message_name: "NOSUCH".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Encoder::new(&db).encode(&header, &DecodedBody::default(), WireFormat::Binary),
            Err(Error::UnknownMessage { .. })
        ));
    }

    #[test]
    fn nmea_passthrough_recomputes_checksum() -> crate::Result<()> {
        let raw = b"$GPALM,1,1,01,1949,00,4310,7b,145f,fd44,a10ce4,1c5b11,0b399f,2643bd,277,000*2F\r\n";
        assert_eq!(reencode_nmea(raw)?, raw.to_vec());
        Ok(())
    }

    #[test]
    fn buffer_full() -> crate::Result<()> {
        let db = db();
        let (mut header, body) = decode_binary_frame(&db)?;
        header.port = Port(1);
        header.time_status = TimeStatus::FineSteering;
        let msg = Message {
            header,
            raw: BINARY_FRAME.to_vec(),
            body: Some(body),
            flattened: None,
            json: None,
        };
        let mut small = [0u8; 16];
        assert!(matches!(
            Encoder::new(&db).encode_into(&msg, WireFormat::Binary, &mut small),
            Err(Error::BufferFull { need: 53, have: 16 })
        ));
        let mut big = [0u8; 128];
        assert_eq!(
            Encoder::new(&db).encode_into(&msg, WireFormat::Binary, &mut big)?,
            53
        );
        assert_eq!(&big[..53], BINARY_FRAME);
        Ok(())
    }
}
