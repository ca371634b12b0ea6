//! Canonical message header and per-format header decoding.
//!
//! Every wire form carries a different header layout; decoding produces one
//! format-independent [`Header`] so downstream code never cares which wire
//! form a message arrived in.
//!
//! Binary header layout (28 bytes, packed little-endian):
//!
//! ```text
//! offset  size  field
//!      0     3  sync 0xAA 0x44 0x12
//!      3     1  header length
//!      4     2  message id
//!      6     1  message type (bit 7 response, bit 0 secondary antenna)
//!      7     1  port
//!      8     2  body length
//!     10     2  sequence
//!     12     1  idle time, half-percent units
//!     13     1  time status
//!     14     2  GNSS week
//!     16     4  milliseconds into week
//!     20     4  receiver status
//!     24     2  message definition CRC
//!     26     2  receiver software version
//! ```
//!
//! The short binary header is 12 bytes: sync `0xAA 0x44 0x13`, body length
//! (u8), message id, week, milliseconds.

use log::debug;

use crate::{Error, Result};

/// First binary sync byte.
pub const BINARY_SYNC1: u8 = 0xAA;
/// Second binary sync byte.
pub const BINARY_SYNC2: u8 = 0x44;
/// Third sync byte of a full binary frame.
pub const BINARY_SYNC3: u8 = 0x12;
/// Third sync byte of a short binary frame.
pub const SHORT_BINARY_SYNC3: u8 = 0x13;
/// Long ASCII sync.
pub const ASCII_SYNC: u8 = b'#';
/// Short ASCII sync.
pub const SHORT_ASCII_SYNC: u8 = b'%';
/// Abbreviated ASCII response sync.
pub const ABBREV_ASCII_SYNC: u8 = b'<';
/// NMEA sentence sync.
pub const NMEA_SYNC: u8 = b'$';

/// Full binary header length in bytes.
pub const BINARY_HEADER_LENGTH: usize = 28;
/// Short binary header length in bytes.
pub const SHORT_BINARY_HEADER_LENGTH: usize = 12;
/// Binary CRC trailer length in bytes.
pub const BINARY_CRC_LENGTH: usize = 4;
/// ASCII CRC field length in hex characters.
pub const ASCII_CRC_LENGTH: usize = 8;
/// NMEA checksum field length in hex characters.
pub const NMEA_CRC_LENGTH: usize = 2;

/// Comma fields in a long ASCII header, between `#` and `;`.
pub const ASCII_HEADER_FIELDS: usize = 10;
/// Comma fields in a short ASCII header, between `%` and `;`.
pub const SHORT_ASCII_HEADER_FIELDS: usize = 3;

/// Which wire form a frame (or a requested encoding) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Full binary, 28-byte header.
    Binary,
    /// Short binary, 12-byte header.
    ShortBinary,
    /// Long ASCII, `#`-sync.
    Ascii,
    /// Short ASCII, `%`-sync.
    ShortAscii,
    /// Abbreviated ASCII console response, `<`-sync.
    AbbrevAscii,
    /// NMEA 0183 sentence, `$`-sync.
    Nmea,
    /// Not a recognized frame.
    #[default]
    Unknown,
}

/// GNSS reference time status, ordered by how well the time is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TimeStatus {
    /// Time validity is unknown.
    #[default]
    Unknown = 20,
    /// Time is set approximately.
    Approximate = 60,
    /// Time is approaching coarse precision.
    CoarseAdjusting = 80,
    /// Time is valid to coarse precision.
    Coarse = 100,
    /// Time is coarse set and being steered.
    CoarseSteering = 120,
    /// Position is lost; range bias cannot be calculated.
    FreeWheeling = 130,
    /// Time is adjusting to fine precision.
    FineAdjusting = 140,
    /// Time has fine precision.
    Fine = 160,
    /// Time is fine set and steered by the backup system.
    FineBackupSteering = 170,
    /// Time is fine set and being steered.
    FineSteering = 180,
    /// Time from satellite, used in ephemeris/almanac logs.
    SatTime = 200,
}

impl TimeStatus {
    /// Decode the binary header byte. Unrecognized values map to `Unknown`.
    #[must_use]
    pub fn from_u8(v: u8) -> Self {
        match v {
            60 => TimeStatus::Approximate,
            80 => TimeStatus::CoarseAdjusting,
            100 => TimeStatus::Coarse,
            120 => TimeStatus::CoarseSteering,
            130 => TimeStatus::FreeWheeling,
            140 => TimeStatus::FineAdjusting,
            160 => TimeStatus::Fine,
            170 => TimeStatus::FineBackupSteering,
            180 => TimeStatus::FineSteering,
            200 => TimeStatus::SatTime,
            _ => TimeStatus::Unknown,
        }
    }

    /// Name as it appears in ASCII headers.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TimeStatus::Unknown => "UNKNOWN",
            TimeStatus::Approximate => "APPROXIMATE",
            TimeStatus::CoarseAdjusting => "COARSEADJUSTING",
            TimeStatus::Coarse => "COARSE",
            TimeStatus::CoarseSteering => "COARSESTEERING",
            TimeStatus::FreeWheeling => "FREEWHEELING",
            TimeStatus::FineAdjusting => "FINEADJUSTING",
            TimeStatus::Fine => "FINE",
            TimeStatus::FineBackupSteering => "FINEBACKUPSTEERING",
            TimeStatus::FineSteering => "FINESTEERING",
            TimeStatus::SatTime => "SATTIME",
        }
    }

    /// Parse an ASCII header token.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UNKNOWN" => TimeStatus::Unknown,
            "APPROXIMATE" => TimeStatus::Approximate,
            "COARSEADJUSTING" => TimeStatus::CoarseAdjusting,
            "COARSE" => TimeStatus::Coarse,
            "COARSESTEERING" => TimeStatus::CoarseSteering,
            "FREEWHEELING" => TimeStatus::FreeWheeling,
            "FINEADJUSTING" => TimeStatus::FineAdjusting,
            "FINE" => TimeStatus::Fine,
            "FINEBACKUPSTEERING" => TimeStatus::FineBackupSteering,
            "FINESTEERING" => TimeStatus::FineSteering,
            "SATTIME" => TimeStatus::SatTime,
            _ => return None,
        })
    }
}

/// Which antenna connector produced a measurement message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntennaSource {
    /// Primary antenna connector.
    #[default]
    Primary,
    /// Secondary antenna connector; names carry a `_1` suffix in ASCII.
    Secondary,
}

/// Receiver communication port, as carried in the binary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Port(pub u8);

impl Port {
    /// Name as it appears in ASCII headers. Unrecognized values map to
    /// `"UNKNOWN"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "SPECIAL",
            1 => "COM1",
            2 => "COM2",
            3 => "COM3",
            6 => "THISPORT",
            7 => "FILE",
            9 => "XCOM1",
            10 => "XCOM2",
            13 => "USB1",
            14 => "USB2",
            15 => "USB3",
            16 => "AUX",
            17 => "XCOM3",
            _ => "UNKNOWN",
        }
    }

    /// Parse an ASCII header token.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(Port(match name {
            "SPECIAL" => 0,
            "COM1" => 1,
            "COM2" => 2,
            "COM3" => 3,
            "UNKNOWN" => 5,
            "THISPORT" => 6,
            "FILE" => 7,
            "XCOM1" => 9,
            "XCOM2" => 10,
            "USB1" => 13,
            "USB2" => 14,
            "USB3" => 15,
            "AUX" => 16,
            "XCOM3" => 17,
            _ => return None,
        }))
    }
}

/// Format-independent message header.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// Message id; 0 when the wire form carries none (ASCII until the
    /// database fills it in, NMEA, responses).
    pub message_id: u16,
    /// Canonical message name, stripped of format and antenna suffixes.
    /// Empty for binary frames until the database fills it in.
    pub message_name: String,
    /// Wire form the frame arrived in.
    pub format: WireFormat,
    /// GNSS reference time status.
    pub time_status: TimeStatus,
    /// GNSS week number. 0 means the receiver had no week.
    pub week: u16,
    /// Milliseconds into the GNSS week. ASCII sub-second fractions are
    /// folded into this integer.
    pub milliseconds: u32,
    /// Receiver idle time in percent (binary wire form is half-percent
    /// units).
    pub idle_time_percent: f32,
    /// Receiver status flag word.
    pub receiver_status: u32,
    /// Message-definition CRC from the header.
    pub message_def_crc: u32,
    /// Receiver software version.
    pub receiver_sw_version: u16,
    /// Logging port.
    pub port: Port,
    /// Sequence number of an embedded message burst.
    pub sequence: u16,
    /// Antenna connector the message derives from.
    pub antenna_source: AntennaSource,
    /// True for command responses.
    pub is_response: bool,
    /// Response id; meaningful only when `is_response`.
    pub response_id: i32,
    /// True when a response reports an error (`response_id != 1`).
    pub is_error_response: bool,
    /// Total frame length in bytes.
    pub message_length: u32,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidHeader(msg.into())
}

fn u16_at(bytes: &[u8], off: usize) -> Result<u16> {
    let b: [u8; 2] = bytes
        .get(off..off + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::UnexpectedEndOfMessage)?;
    Ok(u16::from_le_bytes(b))
}

fn u32_at(bytes: &[u8], off: usize) -> Result<u32> {
    let b: [u8; 4] = bytes
        .get(off..off + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::UnexpectedEndOfMessage)?;
    Ok(u32::from_le_bytes(b))
}

/// Decode a framed byte slice into a canonical header, dispatching on the
/// wire format the framer tagged it with.
pub fn decode_header(format: WireFormat, bytes: &[u8]) -> Result<Header> {
    match format {
        WireFormat::Binary => decode_binary(bytes),
        WireFormat::ShortBinary => decode_short_binary(bytes),
        WireFormat::Ascii => decode_ascii(bytes),
        WireFormat::ShortAscii => decode_short_ascii(bytes),
        WireFormat::AbbrevAscii => decode_abbrev_ascii(bytes),
        WireFormat::Nmea => decode_nmea(bytes),
        WireFormat::Unknown => Err(Error::InvalidSync),
    }
}

fn decode_binary(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < BINARY_HEADER_LENGTH + BINARY_CRC_LENGTH {
        return Err(Error::UnexpectedEndOfMessage);
    }
    let msg_type = bytes[6];
    let mut h = Header {
        message_id: u16_at(bytes, 4)?,
        format: WireFormat::Binary,
        port: Port(bytes[7]),
        sequence: u16_at(bytes, 10)?,
        idle_time_percent: f32::from(bytes[12]) * 0.5,
        time_status: TimeStatus::from_u8(bytes[13]),
        week: u16_at(bytes, 14)?,
        milliseconds: u32_at(bytes, 16)?,
        receiver_status: u32_at(bytes, 20)?,
        message_def_crc: u32::from(u16_at(bytes, 24)?),
        receiver_sw_version: u16_at(bytes, 26)?,
        is_response: msg_type & 0x80 != 0,
        antenna_source: if msg_type & 0x01 != 0 {
            AntennaSource::Secondary
        } else {
            AntennaSource::Primary
        },
        message_length: bytes.len() as u32,
        ..Header::default()
    };
    if h.is_response {
        // The first four body bytes are the response id.
        h.response_id = u32_at(bytes, BINARY_HEADER_LENGTH)? as i32;
        h.is_error_response = h.response_id != 1;
    }
    Ok(h)
}

fn decode_short_binary(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < SHORT_BINARY_HEADER_LENGTH + BINARY_CRC_LENGTH {
        return Err(Error::UnexpectedEndOfMessage);
    }
    Ok(Header {
        message_id: u16_at(bytes, 4)?,
        format: WireFormat::ShortBinary,
        week: u16_at(bytes, 6)?,
        milliseconds: u32_at(bytes, 8)?,
        message_length: bytes.len() as u32,
        ..Header::default()
    })
}

/// Split an ASCII wire name (`BESTPOSA`, `BESTPOSR`, `RANGEA_1`) into the
/// canonical base name, the response flag, and the antenna source.
fn split_wire_name(token: &str) -> Result<(String, bool, AntennaSource)> {
    if token.is_empty() || !token.is_ascii() {
        return Err(invalid(format!("bad message name {token:?}")));
    }
    let (stem, antenna) = match token.strip_suffix("_1") {
        Some(s) => (s, AntennaSource::Secondary),
        None => (token, AntennaSource::Primary),
    };
    let (base, is_response) = match stem.strip_suffix('R') {
        Some(s) => (s, true),
        // Not a response: the trailing character is the format letter.
        None => (&stem[..stem.len().saturating_sub(1)], false),
    };
    if base.is_empty() {
        return Err(invalid(format!("bad message name {token:?}")));
    }
    Ok((base.to_string(), is_response, antenna))
}

fn parse_num<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| invalid(format!("bad {what}: {token:?}")))
}

fn parse_hex(token: &str, what: &str) -> Result<u32> {
    u32::from_str_radix(token, 16).map_err(|_| invalid(format!("bad {what}: {token:?}")))
}

/// Fold an ASCII `seconds.fraction` time of week into milliseconds.
fn parse_seconds(token: &str) -> Result<u32> {
    let (int_part, frac_part) = match token.split_once('.') {
        Some((i, f)) => (i, f),
        None => (token, "0"),
    };
    let secs: u32 = parse_num(int_part, "seconds")?;
    let frac: u32 = parse_num(frac_part, "seconds fraction")?;
    secs.checked_mul(1000)
        .and_then(|ms| ms.checked_add(frac))
        .ok_or_else(|| invalid(format!("seconds out of range: {token:?}")))
}

fn header_fields<'a>(text: &'a str, sync: char, count: usize) -> Result<Vec<&'a str>> {
    let start = text
        .find(sync)
        .ok_or_else(|| invalid(format!("missing {sync:?} sync")))?;
    let end = text
        .find(';')
        .ok_or_else(|| invalid("missing ';' header terminator"))?;
    if end <= start {
        return Err(invalid("header terminator before sync"));
    }
    let fields: Vec<&str> = text[start + 1..end].split(',').collect();
    if fields.len() != count {
        return Err(invalid(format!(
            "expected {count} header fields, got {}",
            fields.len()
        )));
    }
    Ok(fields)
}

fn decode_ascii(bytes: &[u8]) -> Result<Header> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| invalid("ASCII frame is not valid UTF-8"))?;
    let fields = header_fields(text, '#', ASCII_HEADER_FIELDS)?;
    let (name, is_response, antenna_source) = split_wire_name(fields[0])?;
    let port = Port::from_name(fields[1]).unwrap_or_else(|| {
        debug!("unrecognized port name {:?}", fields[1]);
        Port(0)
    });
    let time_status = TimeStatus::from_name(fields[4]).unwrap_or_else(|| {
        debug!("unrecognized time status {:?}", fields[4]);
        TimeStatus::Unknown
    });
    Ok(Header {
        message_name: name,
        format: WireFormat::Ascii,
        port,
        sequence: parse_num(fields[2], "sequence")?,
        idle_time_percent: parse_num(fields[3], "idle time")?,
        time_status,
        week: parse_num(fields[5], "week")?,
        milliseconds: parse_seconds(fields[6])?,
        receiver_status: parse_hex(fields[7], "receiver status")?,
        message_def_crc: parse_hex(fields[8], "message definition crc")?,
        receiver_sw_version: parse_num(fields[9], "software version")?,
        is_response,
        antenna_source,
        message_length: bytes.len() as u32,
        ..Header::default()
    })
}

fn decode_short_ascii(bytes: &[u8]) -> Result<Header> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| invalid("ASCII frame is not valid UTF-8"))?;
    let fields = header_fields(text, '%', SHORT_ASCII_HEADER_FIELDS)?;
    let (name, is_response, antenna_source) = split_wire_name(fields[0])?;
    Ok(Header {
        message_name: name,
        format: WireFormat::ShortAscii,
        week: parse_num(fields[1], "week")?,
        milliseconds: parse_seconds(fields[2])?,
        is_response,
        antenna_source,
        message_length: bytes.len() as u32,
        ..Header::default()
    })
}

fn decode_abbrev_ascii(bytes: &[u8]) -> Result<Header> {
    Ok(Header {
        message_name: "UNKNOWN".to_string(),
        format: WireFormat::AbbrevAscii,
        is_response: true,
        is_error_response: bytes.starts_with(b"<ERROR"),
        message_length: bytes.len() as u32,
        ..Header::default()
    })
}

fn decode_nmea(bytes: &[u8]) -> Result<Header> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| invalid("NMEA frame is not valid UTF-8"))?;
    let start = text.find('$').ok_or_else(|| invalid("missing '$' sync"))?;
    let end = text.find('*').ok_or_else(|| invalid("missing '*' separator"))?;
    if end <= start {
        return Err(invalid("'*' separator before sync"));
    }
    let name = text[start + 1..end]
        .split(',')
        .next()
        .unwrap_or("")
        .to_string();
    if name.is_empty() {
        return Err(invalid("empty NMEA message name"));
    }
    Ok(Header {
        message_name: name,
        format: WireFormat::Nmea,
        message_length: bytes.len() as u32,
        ..Header::default()
    })
}

/// Wire name for serializing a header back to ASCII: base name, then the
/// format or response letter, then the secondary-antenna suffix.
#[must_use]
pub fn ascii_wire_name(header: &Header) -> String {
    let mut name = header.message_name.clone();
    name.push(if header.is_response { 'R' } else { 'A' });
    if header.antenna_source == AntennaSource::Secondary {
        name.push_str("_1");
    }
    name
}
