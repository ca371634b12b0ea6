//! Classification of bytes that never framed.
//!
//! Receivers driven over a console interleave their telemetry with prompt
//! artifacts: `[COM1]` port prompts, `<OK` acknowledgements, bare CR/LF.
//! This classifier scans rejected byte runs for those artifacts and tallies
//! everything else as printable or binary noise. Runs that end in the
//! middle of a possible artifact are held back until more bytes arrive or
//! the stream ends.

use crate::circular_buffer::CircularBuffer;
use crate::framer::FrameShape;

/// Port prompt labels the receiver firmware is known to print. A bracketed
/// sequence matching one of these counts as a port prompt; anything else
/// bracketed is noise.
pub const COM_PORT_PROMPTS: &[&str] = &[
    "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "COM10", "CCOM1",
    "CCOM2", "CCOM3", "CCOM4", "CCOM5", "CCOM6", "CCOM7", "CCOM8", "ICOM1", "ICOM2", "ICOM3",
    "ICOM4", "ICOM5", "ICOM6", "ICOM7", "SCOM1", "SCOM2", "SCOM3", "SCOM4", "NCOM1", "NCOM2",
    "NCOM3", "USB1", "USB2", "USB3", "XCOM1", "XCOM2", "XCOM3", "ACK", "FILE", "AUX", "WCOM1",
];

/// Longest text between `[` and `]` that can still be a port prompt.
const MAX_PROMPT_LENGTH: usize = 6;

/// Tallies over classified unknown bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnknownStats {
    /// Printable bytes not part of any recognized artifact.
    pub ascii_bytes: u64,
    /// Non-printable bytes.
    pub binary_bytes: u64,
    /// Line feeds.
    pub line_feeds: u64,
    /// Carriage returns.
    pub carriage_returns: u64,
    /// `<OK` acknowledgement trigrams.
    pub ok_prompts: u64,
    /// Bracketed prompts matching the port allowlist.
    pub com_ports: u64,
    /// Bytes covered by valid port prompts, brackets included.
    pub valid_com_port_bytes: u64,
    /// Bracketed sequences that were not valid port prompts.
    pub invalid_com_ports: u64,
    /// Complete ASCII-shaped frames that failed integrity.
    pub invalid_ascii_frames: u64,
    /// Complete binary-shaped frames that failed integrity.
    pub invalid_binary_frames: u64,
}

/// Classifier for unknown-byte runs.
#[derive(Debug, Default)]
pub struct UnknownDataHandler {
    hold: CircularBuffer,
    stats: UnknownStats,
}

fn is_printable(b: u8) -> bool {
    (0x20..0x7f).contains(&b)
}

impl UnknownDataHandler {
    /// Create an empty classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics collected so far.
    #[must_use]
    pub fn stats(&self) -> &UnknownStats {
        &self.stats
    }

    /// Clear statistics and any held-back bytes.
    pub fn reset(&mut self) {
        self.hold.clear();
        self.stats = UnknownStats::default();
    }

    fn classify(&mut self, b: u8) {
        if is_printable(b) {
            self.stats.ascii_bytes += 1;
        } else {
            self.stats.binary_bytes += 1;
        }
    }

    /// Feed one unknown run. Runs tagged with a frame shape came from a
    /// complete candidate that failed integrity; they only bump the
    /// per-shape counters. Shapeless runs are scanned for console
    /// artifacts. `eos` forces held-back partial artifacts to be
    /// classified.
    pub fn consume(&mut self, bytes: &[u8], shape: FrameShape, eos: bool) {
        if bytes.is_empty() && !eos {
            return;
        }
        match shape {
            FrameShape::Ascii | FrameShape::Nmea => {
                self.stats.invalid_ascii_frames += 1;
                return;
            }
            FrameShape::Binary => {
                self.stats.invalid_binary_frames += 1;
                return;
            }
            // Rejected console responses are exactly the runs the artifact
            // scan is for.
            FrameShape::None | FrameShape::AbbrevAscii => {}
        }

        self.hold.append(bytes);
        let buf = self.hold.to_vec();
        let mut i = 0;
        while i < buf.len() {
            let b = buf[i];
            match b {
                b'\n' => self.stats.line_feeds += 1,
                b'\r' => self.stats.carriage_returns += 1,
                b'<' => {
                    if buf.len() - i > 2 {
                        if buf[i + 1] == b'O' && buf[i + 2] == b'K' {
                            self.stats.ok_prompts += 1;
                            i += 2;
                        } else {
                            self.classify(b);
                        }
                    } else if eos {
                        self.classify(b);
                    } else {
                        // Might be a split "<OK"; wait for more bytes.
                        break;
                    }
                }
                b'[' => {
                    match buf[i..].iter().position(|&c| c == b']') {
                        Some(close) if close <= MAX_PROMPT_LENGTH => {
                            let label = &buf[i + 1..i + close];
                            let known = std::str::from_utf8(label)
                                .is_ok_and(|s| COM_PORT_PROMPTS.contains(&s));
                            if known {
                                self.stats.com_ports += 1;
                                self.stats.valid_com_port_bytes += close as u64 + 1;
                                i += close;
                            } else {
                                self.stats.invalid_com_ports += 1;
                                self.classify(b);
                            }
                        }
                        Some(_) => self.classify(b),
                        None => {
                            if eos || buf.len() - i >= MAX_PROMPT_LENGTH {
                                self.classify(b);
                            } else {
                                // Might be a split prompt; wait.
                                break;
                            }
                        }
                    }
                }
                _ => self.classify(b),
            }
            i += 1;
        }
        self.hold.discard(i);
    }
}
