//! Frame extraction from a noisy byte stream.
//!
//! A single byte-driven state machine walks the ring buffer looking for
//! frame syncs, validates integrity before a frame is exposed to anything
//! downstream, and resynchronizes after corruption by giving up exactly one
//! byte. Bytes that never frame are delivered back to the caller as tagged
//! unknown runs, so every input byte is accounted for: after N bytes of
//! input, emitted frame lengths plus unknown-run lengths sum to N.
//!
//! The framer owns its [`ByteSource`] and pulls in 10 KiB chunks. A
//! non-blocking source that momentarily has nothing makes [`Framer::produce`]
//! return [`FramerOutput::Pending`] without any state change, so a caller
//! can poll from a cooperative loop.

use log::{debug, trace};

use crate::Result;
use crate::circular_buffer::CircularBuffer;
use crate::crc::Crc32;
use crate::header::{
    ABBREV_ASCII_SYNC, ASCII_CRC_LENGTH, ASCII_HEADER_FIELDS, ASCII_SYNC, BINARY_CRC_LENGTH,
    BINARY_HEADER_LENGTH, BINARY_SYNC1, BINARY_SYNC2, BINARY_SYNC3, NMEA_CRC_LENGTH, NMEA_SYNC,
    SHORT_ASCII_HEADER_FIELDS, SHORT_ASCII_SYNC, SHORT_BINARY_HEADER_LENGTH, SHORT_BINARY_SYNC3,
    WireFormat,
};
use crate::source::ByteSource;

/// Chunk size for pulls from the byte source, and the cap on unknown-byte
/// accumulation before a forced flush.
pub const READ_BUFFER_SIZE: usize = 10240;
/// Longest accepted long/short ASCII frame.
pub const MAX_ASCII_MESSAGE_LENGTH: usize = 64000;
/// Longest accepted NMEA sentence.
pub const MAX_NMEA_MESSAGE_LENGTH: usize = 127;
/// Longest accepted abbreviated ASCII response.
pub const MAX_ABBREV_ASCII_RESPONSE_LENGTH: usize = 127;

/// Shape of the frame candidate a rejected byte run came from, kept so
/// corruption can be attributed in statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameShape {
    /// Plain noise, no recognizable shape.
    #[default]
    None,
    /// A binary candidate failed its CRC.
    Binary,
    /// An ASCII candidate failed its CRC or header shape.
    Ascii,
    /// An NMEA candidate failed its checksum.
    Nmea,
    /// An abbreviated-ASCII candidate was not an `<OK`/`<ERROR:` response.
    AbbrevAscii,
}

/// One validated frame: a complete wire unit from sync through trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header layout this frame uses.
    pub format: WireFormat,
    /// The complete frame bytes.
    pub bytes: Vec<u8>,
}

/// What one [`Framer::produce`] call yielded.
#[derive(Debug, PartialEq)]
pub enum FramerOutput {
    /// A complete, integrity-checked frame.
    Frame(Frame),
    /// A run of bytes that did not frame, in stream order.
    Unknown {
        /// The rejected bytes.
        bytes: Vec<u8>,
        /// Shape of the last failed candidate in the run.
        shape: FrameShape,
    },
    /// Non-blocking source momentarily empty; try again later.
    Pending,
    /// Source exhausted and every byte delivered.
    Eos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    WaitSync,
    WaitBinSync2,
    WaitBinSync3,
    WaitBinHeader,
    WaitShortBinHeader,
    WaitBinBodyCrc,
    WaitShortBinBodyCrc,
    WaitAsciiBody,
    WaitShortAsciiBody,
    WaitAbbrevAsciiBody,
    WaitNmeaBody,
}

/// Resynchronizing framer over a byte source.
pub struct Framer<S> {
    source: S,
    ring: CircularBuffer,
    state: State,
    /// Bytes of the ring visited for the current frame candidate.
    cursor: usize,
    crc: Crc32,
    /// Expected total length of the current binary candidate.
    total: usize,
    unknown: Vec<u8>,
    unknown_shape: FrameShape,
    source_eof: bool,
    skip_crc: bool,
    frames: u64,
    rejected: u64,
}

impl<S: ByteSource> Framer<S> {
    /// Create a framer over a source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            ring: CircularBuffer::new(),
            state: State::default(),
            cursor: 0,
            crc: Crc32::new(),
            total: 0,
            unknown: Vec::new(),
            unknown_shape: FrameShape::None,
            source_eof: false,
            skip_crc: false,
            frames: 0,
            rejected: 0,
        }
    }

    /// Consume integrity trailers without comparing them. Only for tooling
    /// that must accept intentionally corrupted input.
    pub fn skip_crc_validation(&mut self, skip: bool) {
        self.skip_crc = skip;
    }

    /// True once the source reported end of stream.
    #[must_use]
    pub fn at_eof(&self) -> bool {
        self.source_eof
    }

    /// The ingestion ring, for callback-mode producers that append
    /// out-of-band.
    pub fn ring_mut(&mut self) -> &mut CircularBuffer {
        &mut self.ring
    }

    /// Frames emitted and candidates rejected so far.
    #[must_use]
    pub fn counts(&self) -> (u64, u64) {
        (self.frames, self.rejected)
    }

    /// Clear all framing state: ring contents, unknown accumulator, and the
    /// state machine.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.state = State::WaitSync;
        self.cursor = 0;
        self.crc.reset();
        self.total = 0;
        self.unknown.clear();
        self.unknown_shape = FrameShape::None;
        self.source_eof = false;
    }

    fn need_data(&self) -> bool {
        self.ring.is_empty() || self.cursor == self.ring.len()
    }

    fn fill(&mut self) -> Result<usize> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let status = self.source.read(&mut buf)?;
        if status.bytes_read > 0 && !self.source.is_callback_mode() {
            self.ring.append(&buf[..status.bytes_read]);
        }
        if status.eos {
            self.source_eof = true;
        }
        trace!(
            "read {} bytes from source (eos: {})",
            status.bytes_read, status.eos
        );
        Ok(status.bytes_read)
    }

    fn take_unknown(&mut self) -> FramerOutput {
        let bytes = std::mem::take(&mut self.unknown);
        let shape = std::mem::replace(&mut self.unknown_shape, FrameShape::None);
        debug!("delivering {} unknown bytes ({shape:?})", bytes.len());
        FramerOutput::Unknown { bytes, shape }
    }

    /// Give up on the current candidate: its first byte goes to the unknown
    /// run and scanning restarts one byte later. At most one byte is lost
    /// per failed attempt, so a valid frame overlapping a rejected one is
    /// still found.
    fn reject_one(&mut self) -> Result<Option<FramerOutput>> {
        let b = self.ring.byte_at(0)?;
        self.unknown.push(b);
        self.ring.discard(1);
        self.cursor = 0;
        self.state = State::WaitSync;
        self.rejected += 1;
        if self.unknown.len() >= READ_BUFFER_SIZE {
            return Ok(Some(self.take_unknown()));
        }
        Ok(None)
    }

    fn take_frame(&mut self, n: usize, format: WireFormat) -> Frame {
        let mut bytes = vec![0u8; n];
        self.ring.copy_to(&mut bytes);
        self.ring.discard(n);
        self.cursor = 0;
        self.state = State::WaitSync;
        self.frames += 1;
        debug!("framed {n} byte {format:?} frame");
        Frame { format, bytes }
    }

    /// Validate the ASCII candidate in `ring[..cursor]`: trailer layout
    /// `*HHHHHHHH\r\n`, block CRC over the bytes between the sync and `*`,
    /// and the header comma count between sync and `;`.
    fn ascii_frame_ok(&self, short: bool) -> Result<bool> {
        let n = self.cursor;
        if n < ASCII_CRC_LENGTH + 3 + 1 {
            return Ok(false);
        }
        let term = n - (ASCII_CRC_LENGTH + 3);
        if !self.skip_crc {
            if self.ring.byte_at(term)? != b'*' {
                return Ok(false);
            }
            let mut crc = Crc32::new();
            for i in 1..term {
                crc.feed(self.ring.byte_at(i)?);
            }
            let mut hex = [0u8; ASCII_CRC_LENGTH];
            for (k, h) in hex.iter_mut().enumerate() {
                *h = self.ring.byte_at(term + 1 + k)?;
            }
            let Some(want) = std::str::from_utf8(&hex)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 16).ok())
            else {
                return Ok(false);
            };
            if crc.value() != want {
                trace!("ASCII CRC mismatch: want {want:08x}, got {:08x}", crc.value());
                return Ok(false);
            }
        }
        // Cheap header shape check; full parsing happens downstream.
        let expect_commas = if short {
            SHORT_ASCII_HEADER_FIELDS - 1
        } else {
            ASCII_HEADER_FIELDS - 1
        };
        let mut commas = 0;
        for i in 1..term {
            match self.ring.byte_at(i)? {
                b';' => return Ok(commas == expect_commas),
                b',' => commas += 1,
                _ => {}
            }
        }
        Ok(false)
    }

    fn nmea_frame_ok(&self) -> Result<bool> {
        let n = self.cursor;
        if n < NMEA_CRC_LENGTH + 3 + 1 {
            return Ok(false);
        }
        let term = n - (NMEA_CRC_LENGTH + 3);
        if self.ring.byte_at(term)? != b'*' {
            return Ok(false);
        }
        let mut checksum = 0u8;
        for i in 1..term {
            checksum ^= self.ring.byte_at(i)?;
        }
        let hex = [self.ring.byte_at(term + 1)?, self.ring.byte_at(term + 2)?];
        let Some(want) = std::str::from_utf8(&hex)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
        else {
            return Ok(false);
        };
        Ok(checksum == want)
    }

    fn ring_starts_with(&self, prefix: &[u8]) -> Result<bool> {
        if self.cursor < prefix.len() {
            return Ok(false);
        }
        for (i, &p) in prefix.iter().enumerate() {
            if self.ring.byte_at(i)? != p {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drive the state machine until it yields something.
    pub fn produce(&mut self) -> Result<FramerOutput> {
        loop {
            if self.need_data() {
                if !self.source_eof {
                    let n = self.fill()?;
                    if n == 0 && !self.source_eof {
                        return Ok(FramerOutput::Pending);
                    }
                }
                if self.need_data() {
                    if !self.source_eof {
                        // Bytes were reported but arrive out-of-band.
                        return Ok(FramerOutput::Pending);
                    }
                    // End of stream: a partial candidate still in the ring
                    // will never complete, so it joins the unknown run.
                    if !self.ring.is_empty() {
                        let rest = self.ring.to_vec();
                        self.ring.clear();
                        self.unknown.extend_from_slice(&rest);
                    }
                    self.cursor = 0;
                    self.state = State::WaitSync;
                    if !self.unknown.is_empty() {
                        return Ok(self.take_unknown());
                    }
                    return Ok(FramerOutput::Eos);
                }
            }

            let b = self.ring.byte_at(self.cursor)?;
            self.cursor += 1;

            match self.state {
                State::WaitSync => {
                    let is_sync = matches!(
                        b,
                        BINARY_SYNC1 | ASCII_SYNC | SHORT_ASCII_SYNC | NMEA_SYNC | ABBREV_ASCII_SYNC
                    );
                    if is_sync && !self.unknown.is_empty() {
                        // Flush accumulated noise before locking on; the
                        // sync byte stays unconsumed for the next call.
                        self.cursor -= 1;
                        return Ok(self.take_unknown());
                    }
                    match b {
                        BINARY_SYNC1 => {
                            self.crc.reset();
                            self.crc.feed(b);
                            self.state = State::WaitBinSync2;
                        }
                        ASCII_SYNC => self.state = State::WaitAsciiBody,
                        SHORT_ASCII_SYNC => self.state = State::WaitShortAsciiBody,
                        NMEA_SYNC => self.state = State::WaitNmeaBody,
                        ABBREV_ASCII_SYNC => self.state = State::WaitAbbrevAsciiBody,
                        _ => {
                            if let Some(out) = self.reject_one()? {
                                return Ok(out);
                            }
                        }
                    }
                }

                State::WaitBinSync2 => {
                    if b == BINARY_SYNC2 {
                        self.crc.feed(b);
                        self.state = State::WaitBinSync3;
                    } else if let Some(out) = self.reject_one()? {
                        return Ok(out);
                    }
                }

                State::WaitBinSync3 => {
                    if b == BINARY_SYNC3 {
                        self.crc.feed(b);
                        self.state = State::WaitBinHeader;
                    } else if b == SHORT_BINARY_SYNC3 {
                        self.crc.feed(b);
                        self.state = State::WaitShortBinHeader;
                    } else if let Some(out) = self.reject_one()? {
                        return Ok(out);
                    }
                }

                State::WaitBinHeader => {
                    self.crc.feed(b);
                    if self.cursor == BINARY_HEADER_LENGTH {
                        let body_len = u16::from_le_bytes([self.ring.byte_at(8)?, self.ring.byte_at(9)?]);
                        self.total =
                            BINARY_HEADER_LENGTH + usize::from(body_len) + BINARY_CRC_LENGTH;
                        self.state = State::WaitBinBodyCrc;
                    }
                }

                State::WaitShortBinHeader => {
                    self.crc.feed(b);
                    if self.cursor == SHORT_BINARY_HEADER_LENGTH {
                        let body_len = self.ring.byte_at(3)?;
                        self.total = SHORT_BINARY_HEADER_LENGTH
                            + usize::from(body_len)
                            + BINARY_CRC_LENGTH;
                        self.state = State::WaitShortBinBodyCrc;
                    }
                }

                State::WaitBinBodyCrc | State::WaitShortBinBodyCrc => {
                    self.crc.feed(b);
                    if self.cursor == self.total {
                        // CRC over the whole frame including the trailer
                        // cancels to zero when intact.
                        if self.skip_crc || self.crc.value() == 0 {
                            let format = if self.state == State::WaitBinBodyCrc {
                                WireFormat::Binary
                            } else {
                                WireFormat::ShortBinary
                            };
                            let total = self.total;
                            return Ok(FramerOutput::Frame(self.take_frame(total, format)));
                        }
                        trace!("binary CRC residue {:08x}, resyncing", self.crc.value());
                        self.unknown_shape = FrameShape::Binary;
                        if let Some(out) = self.reject_one()? {
                            return Ok(out);
                        }
                    }
                }

                State::WaitAsciiBody | State::WaitShortAsciiBody => {
                    if b == b'\n' || self.cursor >= MAX_ASCII_MESSAGE_LENGTH {
                        let short = self.state == State::WaitShortAsciiBody;
                        if self.ascii_frame_ok(short)? {
                            let format = if short {
                                WireFormat::ShortAscii
                            } else {
                                WireFormat::Ascii
                            };
                            let n = self.cursor;
                            return Ok(FramerOutput::Frame(self.take_frame(n, format)));
                        }
                        self.unknown_shape = FrameShape::Ascii;
                        if let Some(out) = self.reject_one()? {
                            return Ok(out);
                        }
                    }
                }

                State::WaitNmeaBody => {
                    if b == b'\n' || self.cursor >= MAX_NMEA_MESSAGE_LENGTH {
                        if self.nmea_frame_ok()? {
                            let n = self.cursor;
                            return Ok(FramerOutput::Frame(self.take_frame(n, WireFormat::Nmea)));
                        }
                        self.unknown_shape = FrameShape::Nmea;
                        if let Some(out) = self.reject_one()? {
                            return Ok(out);
                        }
                    }
                }

                State::WaitAbbrevAsciiBody => {
                    if b == b'\n' || self.cursor >= MAX_ABBREV_ASCII_RESPONSE_LENGTH {
                        if self.ring_starts_with(b"<OK")? || self.ring_starts_with(b"<ERROR:")? {
                            let n = self.cursor;
                            return Ok(FramerOutput::Frame(
                                self.take_frame(n, WireFormat::AbbrevAscii),
                            ));
                        }
                        self.unknown_shape = FrameShape::AbbrevAscii;
                        if let Some(out) = self.reject_one()? {
                            return Ok(out);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const BINARY_FRAME: &[u8] = &[
        0xaa, 0x44, 0x12, 0x1c, 0x2a, 0x00, 0x00, 0x01, 0x15, 0x00, 0x00, 0x00, 0x90, 0xb4, 0x9d,
        0x07, 0x40, 0xd8, 0x5a, 0x19, 0x20, 0x00, 0x00, 0x02, 0x0a, 0xcb, 0x00, 0x80, 0x00, 0x00,
        0x00, 0x00, 0x90, 0xa0, 0xf8, 0x31, 0xe6, 0x8e, 0x49, 0x40, 0x1f, 0xf4, 0x6c, 0x56, 0x7d,
        0x82, 0x5c, 0xc0, 0x1e, 0xf4, 0x79, 0x87, 0x4e,
    ];

    const SHORT_BINARY_FRAME: &[u8] = &[
        0xaa, 0x44, 0x13, 0x08, 0x45, 0x01, 0x9d, 0x07, 0x40, 0xd8, 0x5a, 0x19, 0xa6, 0x87, 0xf3,
        0xff, 0x7b, 0x00, 0x00, 0x00, 0xca, 0x27, 0xbc, 0x8d,
    ];

    const ASCII_FRAME: &[u8] = b"#TESTPOSA,COM1,0,72.0,FINESTEERING,1949,425384.000,02000020,cb0a,32768;SOL_COMPUTED,51.1164,-114.0389,30*e9b371d3\r\n";

    const NMEA_FRAME: &[u8] =
        b"$GPALM,1,1,01,1949,00,4310,7b,145f,fd44,a10ce4,1c5b11,0b399f,2643bd,277,000*2F\r\n";

    fn framer_over(data: &[u8]) -> Framer<MemorySource> {
        Framer::new(MemorySource::new(data.to_vec()))
    }

    #[test]
    fn frames_binary() -> crate::Result<()> {
        let mut f = framer_over(BINARY_FRAME);
        match f.produce()? {
            FramerOutput::Frame(frame) => {
                assert_eq!(frame.format, WireFormat::Binary);
                assert_eq!(frame.bytes, BINARY_FRAME);
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert_eq!(f.produce()?, FramerOutput::Eos);
        Ok(())
    }

    #[test]
    fn frames_short_binary() -> crate::Result<()> {
        let mut f = framer_over(SHORT_BINARY_FRAME);
        match f.produce()? {
            FramerOutput::Frame(frame) => {
                assert_eq!(frame.format, WireFormat::ShortBinary);
                assert_eq!(frame.bytes, SHORT_BINARY_FRAME);
            }
            other => panic!("expected frame, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn frames_ascii_nmea_abbrev() -> crate::Result<()> {
        for (data, format) in [
            (ASCII_FRAME, WireFormat::Ascii),
            (NMEA_FRAME, WireFormat::Nmea),
            (&b"<OK\r\n"[..], WireFormat::AbbrevAscii),
        ] {
            let mut f = framer_over(data);
            match f.produce()? {
                FramerOutput::Frame(frame) => {
                    assert_eq!(frame.format, format);
                    assert_eq!(frame.bytes, data);
                }
                other => panic!("expected {format:?} frame, got {other:?}"),
            }
            assert_eq!(f.produce()?, FramerOutput::Eos);
        }
        Ok(())
    }

    #[test]
    fn noise_before_frame_is_flushed_first() -> crate::Result<()> {
        let mut data = b"garbage!".to_vec();
        data.extend_from_slice(ASCII_FRAME);
        let mut f = framer_over(&data);

        match f.produce()? {
            FramerOutput::Unknown { bytes, shape } => {
                assert_eq!(bytes, b"garbage!");
                assert_eq!(shape, FrameShape::None);
            }
            other => panic!("expected unknown run, got {other:?}"),
        }
        match f.produce()? {
            FramerOutput::Frame(frame) => assert_eq!(frame.format, WireFormat::Ascii),
            other => panic!("expected frame, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn corrupt_crc_recovers_on_next_frame() -> crate::Result<()> {
        let mut first = ASCII_FRAME.to_vec();
        // One wrong hex digit in the first frame's CRC.
        let crc_pos = first.len() - 4;
        first[crc_pos] = b'0';
        first.extend_from_slice(ASCII_FRAME);
        let mut f = framer_over(&first);

        match f.produce()? {
            FramerOutput::Unknown { bytes, shape } => {
                assert_eq!(bytes.len(), ASCII_FRAME.len());
                assert_eq!(shape, FrameShape::Ascii);
            }
            other => panic!("expected unknown run, got {other:?}"),
        }
        match f.produce()? {
            FramerOutput::Frame(frame) => assert_eq!(frame.bytes, ASCII_FRAME),
            other => panic!("expected frame, got {other:?}"),
        }
        assert_eq!(f.produce()?, FramerOutput::Eos);
        Ok(())
    }

    #[test]
    fn valid_frame_overlapping_rejected_candidate() -> crate::Result<()> {
        // A stray short-binary sync prefix swallows the real frame start.
        // The bogus candidate reads its body length from the ASCII text
        // ('#' = 35), completes mid-stream, fails CRC, and resync must then
        // find the real frame starting one byte after the bogus sync.
        let mut data = vec![0xaa, 0x44, 0x13];
        data.extend_from_slice(ASCII_FRAME);
        let mut f = framer_over(&data);
        let mut got_frame = false;
        let mut unknown_bytes = 0;
        loop {
            match f.produce()? {
                FramerOutput::Frame(frame) => {
                    assert_eq!(frame.bytes, ASCII_FRAME);
                    got_frame = true;
                }
                FramerOutput::Unknown { bytes, .. } => unknown_bytes += bytes.len(),
                FramerOutput::Pending => unreachable!(),
                FramerOutput::Eos => break,
            }
        }
        assert!(got_frame);
        assert_eq!(unknown_bytes, 3);
        Ok(())
    }

    #[test]
    fn skip_crc_accepts_corrupt_binary() -> crate::Result<()> {
        let mut data = BINARY_FRAME.to_vec();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        let mut f = framer_over(&data);
        f.skip_crc_validation(true);
        assert!(matches!(f.produce()?, FramerOutput::Frame(_)));
        Ok(())
    }

    #[test]
    fn pending_on_empty_non_blocking_source() -> crate::Result<()> {
        let mut f = Framer::new(MemorySource::non_blocking());
        assert_eq!(f.produce()?, FramerOutput::Pending);
        // No state change: feeding the frame afterwards still works.
        Ok(())
    }

    #[test]
    fn partial_frame_at_eos_is_unknown() -> crate::Result<()> {
        let mut f = framer_over(&BINARY_FRAME[..20]);
        match f.produce()? {
            FramerOutput::Unknown { bytes, .. } => assert_eq!(bytes.len(), 20),
            other => panic!("expected unknown run, got {other:?}"),
        }
        assert_eq!(f.produce()?, FramerOutput::Eos);
        Ok(())
    }

    #[test]
    fn unknown_run_flushes_at_cap() -> crate::Result<()> {
        let data = vec![b'z'; READ_BUFFER_SIZE + 100];
        let mut f = framer_over(&data);
        match f.produce()? {
            FramerOutput::Unknown { bytes, .. } => assert_eq!(bytes.len(), READ_BUFFER_SIZE),
            other => panic!("expected unknown run, got {other:?}"),
        }
        match f.produce()? {
            FramerOutput::Unknown { bytes, .. } => assert_eq!(bytes.len(), 100),
            other => panic!("expected unknown run, got {other:?}"),
        }
        assert_eq!(f.produce()?, FramerOutput::Eos);
        Ok(())
    }

    #[test]
    fn byte_conservation_over_mixed_stream() -> crate::Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(b"\x01\x02junk");
        data.extend_from_slice(BINARY_FRAME);
        data.extend_from_slice(b"more junk $ not a frame\r\n");
        data.extend_from_slice(ASCII_FRAME);
        data.extend_from_slice(&[0xaa, 0x44]);

        let mut f = framer_over(&data);
        let mut seen = 0usize;
        loop {
            match f.produce()? {
                FramerOutput::Frame(frame) => seen += frame.bytes.len(),
                FramerOutput::Unknown { bytes, .. } => seen += bytes.len(),
                FramerOutput::Pending => unreachable!(),
                FramerOutput::Eos => break,
            }
        }
        assert_eq!(seen, data.len());
        Ok(())
    }

    #[test]
    fn chunked_input_framing_is_invariant() -> crate::Result<()> {
        // Feed the same stream one byte at a time through a callback-style
        // ring and compare against the one-shot result.
        let mut data = b"noise".to_vec();
        data.extend_from_slice(BINARY_FRAME);
        data.extend_from_slice(ASCII_FRAME);

        let mut whole = Vec::new();
        let mut f = framer_over(&data);
        loop {
            match f.produce()? {
                FramerOutput::Eos => break,
                out => whole.push(format!("{out:?}")),
            }
        }

        let mut chunked = Vec::new();
        let mut f = Framer::new(MemorySource::non_blocking());
        for &b in &data {
            f.ring_mut().append(&[b]);
            loop {
                match f.produce()? {
                    FramerOutput::Pending => break,
                    out => chunked.push(format!("{out:?}")),
                }
            }
        }
        // Final flush: tell the framer the stream is over.
        // (A non-blocking source never reports EOS by itself.)
        f.source_eof = true;
        loop {
            match f.produce()? {
                FramerOutput::Eos => break,
                FramerOutput::Pending => unreachable!(),
                out => chunked.push(format!("{out:?}")),
            }
        }

        assert_eq!(whole, chunked);
        Ok(())
    }
}
