//! src/tfrecord/mod.rs
//!
//! TFRecord container format.
//!
//! A TFRecord file is a plain sequence of frames:
//!
//! ```text
//! u64  length            (little endian)
//! u32  masked_crc32c(length bytes)
//! [u8] data              (`length` bytes)
//! u32  masked_crc32c(data)
//! ```
//!
//! The CRC is CRC32-C (Castagnoli), rotated and offset by a constant so that
//! checksumming data which itself contains CRCs stays well distributed.

mod reader;
mod writer;

pub use reader::TfRecordReader;
pub use writer::TfRecordWriter;

/// Bytes before the payload: length plus its checksum.
pub const HEADER_LEN: usize = 12;
/// Bytes after the payload: the payload checksum.
pub const FOOTER_LEN: usize = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32-C of `data`, masked the way TFRecord stores it.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    mask(crc32c::crc32c(data))
}

pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

pub fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}
