//! src/transforms/vision/io.rs

use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

// ============================================================================
// DecodeImage
// ============================================================================

/// Decodes an in-memory encoded image.
///
/// The container format is sniffed from the leading bytes, so JPEG, PNG and
/// the other formats enabled in the `image` crate all decode without the
/// caller naming one. The pixel layout is whatever the file stores; follow
/// with [`EnsureRgb`](super::EnsureRgb) to get three channels.
///
/// # Input/Output
/// - **Input**: `Vec<u8>` - encoded image bytes
/// - **Output**: `DynamicImage`
///
/// # Example
/// ```ignore
/// let image = DecodeImage.apply(features.encoded)?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeImage;

impl DecodeImage {
    /// Sniffs the container format without decoding.
    pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}

impl Transform<Vec<u8>, DynamicImage> for DecodeImage {
    fn apply(&self, bytes: Vec<u8>) -> Result<DynamicImage> {
        ensure!(!bytes.is_empty(), "Cannot decode an empty image buffer");
        let len = bytes.len();

        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("Failed to sniff image format")?
            .decode()
            .with_context(|| format!("Failed to decode image ({} bytes)", len))
    }
}
