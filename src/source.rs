//! Byte-stream input collaborators.
//!
//! The framer depends only on the [`ByteSource`] capability. File and memory
//! sources block until data or end of stream; port-style sources may return
//! zero bytes, in which case the framer hands control back to the caller
//! without touching its state.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::Result;

/// Outcome of one [`ByteSource::read`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadStatus {
    /// Bytes placed into the caller's buffer.
    pub bytes_read: usize,
    /// Total stream length, when the source knows it.
    pub stream_length: Option<u64>,
    /// Percent of the stream consumed so far, when known.
    pub percent: f32,
    /// True once the source has no more bytes beyond the ones returned.
    pub eos: bool,
}

/// Capability the framer pulls bytes through.
pub trait ByteSource {
    /// Fill `buf` with up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus>;

    /// True when data arrives out-of-band and the producer appends to the
    /// framer's ring directly; `read` then only reports counts and status.
    fn is_callback_mode(&self) -> bool {
        false
    }
}

/// Read a stream from a file.
pub struct FileSource {
    reader: BufReader<File>,
    length: u64,
    position: u64,
}

impl FileSource {
    /// Open a file for decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(&path)?;
        let length = f.metadata()?.len();
        debug!(
            "Opening source {} ({} bytes)",
            path.as_ref().display(),
            length
        );
        Ok(Self {
            reader: BufReader::new(f),
            length,
            position: 0,
        })
    }

    /// Seek back to the start of the file.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.position = 0;
        Ok(())
    }

    /// Current byte offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus> {
        let n = self.reader.read(buf)?;
        self.position += n as u64;
        let percent = if self.length == 0 {
            100.0
        } else {
            self.position as f32 * 100.0 / self.length as f32
        };
        Ok(ReadStatus {
            bytes_read: n,
            stream_length: Some(self.length),
            percent,
            eos: self.position >= self.length,
        })
    }
}

/// Read a stream from an in-memory buffer.
///
/// With `callback_mode` the buffer doubles as a staging area a producer
/// appends to; `read` then drains nothing itself and never reports end of
/// stream.
pub struct MemorySource {
    data: Vec<u8>,
    cursor: usize,
    blocking: bool,
    callback_mode: bool,
}

impl MemorySource {
    /// Source over an owned buffer. Reports end of stream once drained.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            cursor: 0,
            blocking: true,
            callback_mode: false,
        }
    }

    /// Port-style source: the producer appends, `read` yields whatever has
    /// arrived since the last call and returns zero bytes when idle. Never
    /// reports end of stream.
    #[must_use]
    pub fn non_blocking() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            blocking: false,
            callback_mode: false,
        }
    }

    /// Callback-style source: data is appended to the framer's ring by the
    /// producer; `read` only reports status.
    #[must_use]
    pub fn callback() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            blocking: false,
            callback_mode: true,
        }
    }

    /// Append bytes for a later `read` to pick up.
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Bytes not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus> {
        let n = buf.len().min(self.data.len() - self.cursor);
        buf[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(ReadStatus {
            bytes_read: n,
            stream_length: Some(self.data.len() as u64),
            percent: if self.data.is_empty() {
                100.0
            } else {
                self.cursor as f32 * 100.0 / self.data.len() as f32
            },
            eos: self.blocking && self.cursor == self.data.len(),
        })
    }

    fn is_callback_mode(&self) -> bool {
        self.callback_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_drains() -> Result<()> {
        let mut src = MemorySource::new(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        let st = src.read(&mut buf)?;
        assert_eq!(st.bytes_read, 3);
        assert!(!st.eos);
        let st = src.read(&mut buf)?;
        assert_eq!(st.bytes_read, 2);
        assert!(st.eos);
        assert_eq!(&buf[..2], &[4, 5]);
        Ok(())
    }

    #[test]
    fn file_source() -> Result<()> {
        let tmpd = tempfile::tempdir()?;
        let path = tmpd.path().join("delme.bin");
        std::fs::write(&path, b"stream bytes")?;

        let mut src = FileSource::open(&path)?;
        let mut buf = [0u8; 64];
        let st = src.read(&mut buf)?;
        assert_eq!(st.bytes_read, 12);
        assert!(st.eos);
        assert_eq!(&buf[..12], b"stream bytes");
        assert_eq!(st.stream_length, Some(12));

        src.rewind()?;
        let st = src.read(&mut buf[..4])?;
        assert_eq!(st.bytes_read, 4);
        assert!(!st.eos);
        assert!((st.percent - 33.33).abs() < 0.1);
        Ok(())
    }

    #[test]
    fn non_blocking_source_returns_empty() -> Result<()> {
        let mut src = MemorySource::non_blocking();
        let mut buf = [0u8; 8];
        let st = src.read(&mut buf)?;
        assert_eq!(st.bytes_read, 0);
        assert!(!st.eos);
        src.push(b"abc");
        let st = src.read(&mut buf)?;
        assert_eq!(st.bytes_read, 3);
        assert!(!st.eos);
        Ok(())
    }
}
