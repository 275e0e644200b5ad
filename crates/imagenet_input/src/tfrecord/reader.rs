//! src/tfrecord/reader.rs

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::trace;

use super::{masked_crc32c, FOOTER_LEN, HEADER_LEN};
use crate::error::InputError;

/// Sequential reader over the records of one TFRecord stream.
///
/// Iterating yields each record's payload. The stream ends cleanly only at
/// a frame boundary; a truncated frame or a checksum mismatch yields one
/// [`InputError::Corrupted`] and then ends the iteration.
pub struct TfRecordReader<R> {
    reader: R,
    origin: String,
    verify_checksums: bool,
    offset: u64,
    failed: bool,
}

impl TfRecordReader<BufReader<File>> {
    /// Opens a TFRecord file.
    pub fn open(path: impl AsRef<Path>, verify_checksums: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open TFRecord file: {}", path.display()))?;
        trace!(path = %path.display(), "Opened TFRecord file");
        Ok(Self::new(
            BufReader::new(file),
            path.display().to_string(),
            verify_checksums,
        ))
    }
}

impl<R: Read> TfRecordReader<R> {
    /// Wraps any byte source; `origin` names it in error messages.
    pub fn new(reader: R, origin: impl Into<String>, verify_checksums: bool) -> Self {
        Self {
            reader,
            origin: origin.into(),
            verify_checksums,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record; `Ok(None)` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let frame_start = self.offset;

        let mut header = [0u8; HEADER_LEN];
        let filled = read_full(&mut self.reader, &mut header)
            .with_context(|| format!("Failed to read {}", self.origin))?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < HEADER_LEN {
            return Err(self.corrupted(
                frame_start,
                format!("truncated header ({} of {} bytes)", filled, HEADER_LEN),
            ));
        }

        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&header[..8]);
        let mut length_crc = [0u8; 4];
        length_crc.copy_from_slice(&header[8..]);

        if self.verify_checksums && masked_crc32c(&length_bytes) != u32::from_le_bytes(length_crc) {
            return Err(self.corrupted(frame_start, "length checksum mismatch"));
        }
        let length = u64::from_le_bytes(length_bytes);

        let mut data = Vec::new();
        let read = (&mut self.reader)
            .take(length)
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to read {}", self.origin))?;
        if (read as u64) < length {
            return Err(self.corrupted(
                frame_start,
                format!("truncated payload ({} of {} bytes)", read, length),
            ));
        }

        let mut footer = [0u8; FOOTER_LEN];
        let filled = read_full(&mut self.reader, &mut footer)
            .with_context(|| format!("Failed to read {}", self.origin))?;
        if filled < FOOTER_LEN {
            return Err(self.corrupted(frame_start, "truncated payload checksum"));
        }
        if self.verify_checksums && masked_crc32c(&data) != u32::from_le_bytes(footer) {
            return Err(self.corrupted(frame_start, "payload checksum mismatch"));
        }

        self.offset = frame_start + (HEADER_LEN + FOOTER_LEN) as u64 + length;
        Ok(Some(data))
    }

    fn corrupted(&mut self, offset: u64, message: impl Into<String>) -> anyhow::Error {
        self.failed = true;
        anyhow!(InputError::corrupted(self.origin.clone(), offset, message))
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Fills `buf` as far as the stream allows and returns the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
