//! Decoder facade: framing, header decode, body decode, projections.
//!
//! One [`Decoder`] owns a framer (and through it the byte source), the
//! unknown-data classifier and the message statistics. Each
//! [`Decoder::read_message`] call yields the next thing in the stream, in
//! arrival order: a decoded message, an unknown-byte run, `Pending` for a
//! momentarily-empty non-blocking source, or `Eos`.

use log::{debug, trace};

use crate::body::{BodyDecoder, DecodedBody};
use crate::framer::{Frame, FrameShape, Framer, FramerOutput};
use crate::header::{
    BINARY_CRC_LENGTH, BINARY_HEADER_LENGTH, Header, SHORT_BINARY_HEADER_LENGTH, WireFormat,
    decode_header,
};
use crate::message_db::{MessageDatabase, MessageDef};
use crate::source::ByteSource;
use crate::stats::{CounterConfig, DecoderStatistics, MessageCounter};
use crate::unknown::{UnknownDataHandler, UnknownStats};
use crate::{Error, Result};

/// Decoder behavior switches.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Deliver unknown-byte runs to the caller. When false they are counted
    /// by the classifier and dropped, uniformly.
    pub enable_unknown: bool,
    /// Consume integrity trailers without comparing them.
    pub skip_crc: bool,
    /// Produce the flat-binary projection for each decoded message.
    pub flatten: bool,
    /// Produce the JSON text projection for each decoded message.
    pub json: bool,
    /// Statistics configuration.
    pub counter: CounterConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_unknown: true,
            skip_crc: false,
            flatten: true,
            json: true,
            counter: CounterConfig::default(),
        }
    }
}

/// One fully decoded message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Canonical header.
    pub header: Header,
    /// The complete framed wire bytes.
    pub raw: Vec<u8>,
    /// Schema-decoded body. `None` for responses, NMEA sentences, and other
    /// messages without a schema walk.
    pub body: Option<DecodedBody>,
    /// Flat-binary projection, when configured.
    pub flattened: Option<Vec<u8>>,
    /// JSON text projection, when configured.
    pub json: Option<String>,
}

impl Message {
    /// Comma-split payload fields of an NMEA sentence (name included as
    /// field zero). `None` for non-NMEA messages.
    #[must_use]
    pub fn nmea_fields(&self) -> Option<Vec<&str>> {
        if self.header.format != WireFormat::Nmea {
            return None;
        }
        let text = std::str::from_utf8(&self.raw).ok()?;
        let start = text.find('$')?;
        let end = text.find('*').filter(|&e| e > start)?;
        Some(text[start + 1..end].split(',').collect())
    }

    /// Response payload text (`<OK`, `<ERROR:…`) without the line
    /// terminator. `None` for non-response messages.
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        if !self.header.is_response {
            return None;
        }
        let text = std::str::from_utf8(&self.raw).ok()?;
        Some(text.trim_end_matches(['\r', '\n']))
    }
}

/// A run of bytes that did not frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRun {
    /// The rejected bytes, in stream order.
    pub bytes: Vec<u8>,
    /// Shape of the last failed frame candidate in the run.
    pub shape: FrameShape,
}

/// Outcome of one [`Decoder::read_message`] call.
#[derive(Debug)]
pub enum Read {
    /// The next decoded message.
    Message(Message),
    /// A run of unframeable bytes (only when `enable_unknown`).
    Unknown(UnknownRun),
    /// Non-blocking source momentarily empty; call again later.
    Pending,
    /// Stream exhausted.
    Eos,
}

/// Pull-based decoder over one byte source.
pub struct Decoder<'db, S> {
    db: &'db MessageDatabase,
    framer: Framer<S>,
    config: DecoderConfig,
    counter: MessageCounter,
    unknown: UnknownDataHandler,
}

impl<'db, S: ByteSource> Decoder<'db, S> {
    /// Create a decoder over a shared database and an owned source.
    pub fn new(db: &'db MessageDatabase, source: S, config: DecoderConfig) -> Self {
        let mut framer = Framer::new(source);
        framer.skip_crc_validation(config.skip_crc);
        Self {
            db,
            framer,
            counter: MessageCounter::new(config.counter.clone()),
            unknown: UnknownDataHandler::new(),
            config,
        }
    }

    /// Toggle integrity checking at runtime.
    pub fn skip_crc_validation(&mut self, skip: bool) {
        self.config.skip_crc = skip;
        self.framer.skip_crc_validation(skip);
    }

    /// The ingestion ring, for callback-mode producers.
    pub fn ring_mut(&mut self) -> &mut crate::circular_buffer::CircularBuffer {
        self.framer.ring_mut()
    }

    /// Unknown-data statistics collected so far.
    #[must_use]
    pub fn unknown_stats(&self) -> &UnknownStats {
        self.unknown.stats()
    }

    /// Per-message counters.
    #[must_use]
    pub fn counter(&self) -> &MessageCounter {
        &self.counter
    }

    /// Aggregate decode statistics.
    #[must_use]
    pub fn statistics(&self) -> &DecoderStatistics {
        self.counter.statistics()
    }

    /// Clear framing state, statistics, and the unknown classifier.
    pub fn reset(&mut self) {
        self.framer.reset();
        self.counter.reset();
        self.unknown.reset();
    }

    /// Decode and return the next item from the stream.
    ///
    /// Frame-level corruption never surfaces here; it arrives as
    /// [`Read::Unknown`] runs. Errors are returned for header/schema-level
    /// failures and the decoder stays resumable: the offending frame has
    /// already been consumed, so the next call proceeds with the stream.
    pub fn read_message(&mut self) -> Result<Read> {
        loop {
            match self.framer.produce()? {
                FramerOutput::Pending => return Ok(Read::Pending),
                FramerOutput::Eos => return Ok(Read::Eos),
                FramerOutput::Unknown { bytes, shape } => {
                    self.unknown.consume(&bytes, shape, self.framer.at_eof());
                    if self.config.enable_unknown {
                        return Ok(Read::Unknown(UnknownRun { bytes, shape }));
                    }
                    trace!("dropping {} unknown bytes (disabled)", bytes.len());
                }
                FramerOutput::Frame(frame) => {
                    let msg = self.decode_frame(frame)?;
                    self.counter.count(&msg.header);
                    return Ok(Read::Message(msg));
                }
            }
        }
    }

    fn decode_frame(&mut self, frame: Frame) -> Result<Message> {
        let mut header = decode_header(frame.format, &frame.bytes)?;
        debug!(
            "decoding {:?} frame, id {} name {:?}",
            frame.format, header.message_id, header.message_name
        );
        match frame.format {
            WireFormat::Binary | WireFormat::ShortBinary => {
                let def = self.db.definition_by_id(header.message_id).ok_or_else(|| {
                    Error::UnknownMessage {
                        message_id: header.message_id,
                        name: header.message_name.clone(),
                        raw: frame.bytes.clone(),
                    }
                })?;
                header.message_name = def.name.clone();
                if header.is_response {
                    // Responses carry free text, not the schema body.
                    return Ok(self.bare_message(header, frame.bytes));
                }
                let header_len = if frame.format == WireFormat::Binary {
                    BINARY_HEADER_LENGTH
                } else {
                    SHORT_BINARY_HEADER_LENGTH
                };
                let body_bytes = &frame.bytes[header_len..frame.bytes.len() - BINARY_CRC_LENGTH];
                let body = BodyDecoder::new(self.db, def).decode_binary(body_bytes)?;
                self.project(header, frame.bytes.clone(), body, def)
            }
            WireFormat::Ascii | WireFormat::ShortAscii => {
                let def = self
                    .db
                    .definition_by_name(&header.message_name)
                    .ok_or_else(|| Error::UnknownMessage {
                        message_id: 0,
                        name: header.message_name.clone(),
                        raw: frame.bytes.clone(),
                    })?;
                header.message_id = def.message_id;
                if header.is_response {
                    return Ok(self.bare_message(header, frame.bytes));
                }
                let text = std::str::from_utf8(&frame.bytes)
                    .map_err(|_| Error::InvalidHeader("ASCII frame is not valid UTF-8".into()))?;
                let (semi, star) = match (text.find(';'), text.rfind('*')) {
                    (Some(s), Some(e)) if s < e => (s, e),
                    _ => {
                        return Err(Error::InvalidHeader(
                            "ASCII frame missing body delimiters".into(),
                        ));
                    }
                };
                let body = BodyDecoder::new(self.db, def).decode_ascii(&text[semi + 1..star])?;
                self.project(header, frame.bytes.clone(), body, def)
            }
            WireFormat::AbbrevAscii | WireFormat::Nmea => Ok(self.bare_message(header, frame.bytes)),
            WireFormat::Unknown => Err(Error::InvalidSync),
        }
    }

    fn bare_message(&self, header: Header, raw: Vec<u8>) -> Message {
        Message {
            header,
            raw,
            body: None,
            flattened: None,
            json: None,
        }
    }

    fn project(
        &self,
        header: Header,
        raw: Vec<u8>,
        body: DecodedBody,
        def: &MessageDef,
    ) -> Result<Message> {
        let flattened = if self.config.flatten {
            Some(body.flatten(def)?)
        } else {
            None
        };
        let json = if self.config.json {
            Some(body.to_json_string(def, self.db)?)
        } else {
            None
        };
        Ok(Message {
            header,
            raw,
            body: Some(body),
            flattened,
            json,
        })
    }
}
