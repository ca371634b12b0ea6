#![warn(missing_docs)]
/*! This crate decodes and re-encodes GNSS receiver telemetry messages.

Receivers emit the same message family in several wire forms: full binary
with a 28-byte header, short binary with a 12-byte header, long and short
ASCII with a semicolon-terminated header, abbreviated ASCII console
responses, and NMEA 0183 sentences. This crate takes a byte stream from any
source (file, memory, serial port) and turns it into structured messages,
and symmetrically serializes structured messages back into any of the wire
forms.

Decoding is a three-layer pipeline:

```text
   [ ByteSource (file / memory / port) ]
                  ↓
   [ Framer: resync state machine,   ]
   [ CRC/checksum validation         ]
                  ↓
   [ Header decode: canonical header ]
                  ↓
   [ Body decode: walk the message   ]
   [ definition database field by    ]
   [ field                           ]
                  ↓
   [ Message + flat record + JSON    ]
```

Bytes that do not frame (line noise, console prompts, corrupted frames) are
never lost: the framer hands them back as tagged unknown runs, and the
[`unknown::UnknownDataHandler`] tallies what they looked like.

Message layouts are not compiled in. A [`message_db::MessageDatabase`] is
loaded from JSON at runtime and shared read-only by every decoder and
encoder, so a new receiver firmware only needs a new database file.

# Example

Decode a byte buffer and re-encode every message as long ASCII:

```
use gnsslog::decoder::{Decoder, DecoderConfig, Read};
use gnsslog::encoder::Encoder;
use gnsslog::header::WireFormat;
use gnsslog::message_db::MessageDatabase;
use gnsslog::source::MemorySource;

# fn main() -> gnsslog::Result<()> {
# let json = r#"{"enums": [], "messages": []}"#;
let db = MessageDatabase::from_json_str(json)?;
let src = MemorySource::new(Vec::new());
let mut decoder = Decoder::new(&db, src, DecoderConfig::default());
let encoder = Encoder::new(&db);
loop {
    match decoder.read_message() {
        Ok(Read::Message(msg)) => {
            let ascii = encoder.encode_message(&msg, WireFormat::Ascii)?;
            print!("{}", String::from_utf8_lossy(&ascii));
        }
        Ok(Read::Unknown(run)) => eprintln!("skipped {} bytes", run.bytes.len()),
        Ok(Read::Pending) => continue,
        Ok(Read::Eos) => break,
        Err(e) => eprintln!("{e}"),
    }
}
# Ok(())
# }
```
*/

pub mod body;
pub mod circular_buffer;
pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod framer;
pub mod header;
pub mod message_db;
pub mod source;
pub mod stats;
pub mod unknown;

use framer::FrameShape;
use header::WireFormat;

/// Crate error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No input source configured.
    #[error("no input source configured")]
    NullInput,

    /// Byte at the buffer head did not match any sync pattern.
    #[error("no sync pattern at buffer head")]
    InvalidSync,

    /// Integrity check failed. The shape of the failed candidate is kept so
    /// corruption can be attributed. The framer recovers from this
    /// internally; callers only see it from direct integrity APIs.
    #[error("integrity check failed for {0:?} frame")]
    InvalidCrc(FrameShape),

    /// Header field count, numeric parse, or name resolution failed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Header parsed but the message has no schema in the database. The raw
    /// frame is carried so the caller can still account for the bytes.
    #[error("message {message_id} ({name:?}) has no definition in the database")]
    UnknownMessage {
        /// Message id from the header (0 if the wire form carries none).
        message_id: u16,
        /// Message name from the header (empty for binary frames).
        name: String,
        /// The complete framed bytes.
        raw: Vec<u8>,
    },

    /// Stream or framed body ended in the middle of a field.
    #[error("unexpected end of message")]
    UnexpectedEndOfMessage,

    /// Caller-supplied encode buffer too small.
    #[error("encode buffer too small: need {need} bytes, have {have}")]
    BufferFull {
        /// Bytes the encoded frame requires.
        need: usize,
        /// Bytes the caller supplied.
        have: usize,
    },

    /// Requested output format does not match the message's shape.
    #[error("cannot encode {name:?} as {requested:?}")]
    InvalidEncodeFormat {
        /// Message name.
        name: String,
        /// The rejected target format.
        requested: WireFormat,
    },

    /// Logical offset past the end of a buffer.
    #[error("offset {0} out of bounds (length {1})")]
    OutOfBounds(usize, usize),

    /// Message body disagrees with its schema.
    #[error("malformed message body: {0}")]
    InvalidMessage(String),

    /// I/O error from the byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed message-definition database.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
