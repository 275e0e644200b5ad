//! src/transforms/vision/geometric.rs

use crate::pipeline::thread::worker_gen_range;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

// ============================================================================
// EnsureRgb
// ============================================================================
/// Ensures that the image is 3-channel RGB (8 bits per channel).
/// Grayscale is replicated, alpha is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureRgb;

impl Transform<DynamicImage, DynamicImage> for EnsureRgb {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(_) => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        })
    }
}

// ============================================================================
// AspectPreservingResize
// ============================================================================

/// Output `(width, height)` whose smaller side is `smallest_side`, keeping
/// the aspect ratio (rounded to the nearest pixel).
pub fn smallest_size_at_least(width: u32, height: u32, smallest_side: u32) -> (u32, u32) {
    let scale = smallest_side as f64 / width.min(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    (new_width, new_height)
}

/// Resizes so the smaller side equals `smallest_side`, preserving aspect
/// ratio. Uses bilinear filtering.
///
/// # Examples
/// ```ignore
/// let resize = AspectPreservingResize::new(256)?;
/// let resized = resize.apply(img)?; // 500x375 -> 341x256
/// ```
#[derive(Debug, Clone)]
pub struct AspectPreservingResize {
    smallest_side: u32,
}

impl AspectPreservingResize {
    pub fn new(smallest_side: u32) -> Result<Self> {
        ensure!(smallest_side > 0, "smallest_side must be positive");
        Ok(Self { smallest_side })
    }
}

impl Transform<DynamicImage, DynamicImage> for AspectPreservingResize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        resize_smallest_side(img, self.smallest_side)
    }
}

fn resize_smallest_side(img: DynamicImage, smallest_side: u32) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();
    ensure!(
        width > 0 && height > 0,
        "Cannot resize an empty image ({}x{})",
        width,
        height
    );
    let (new_width, new_height) = smallest_size_at_least(width, height, smallest_side);
    if (new_width, new_height) == (width, height) {
        return Ok(img);
    }
    Ok(img.resize_exact(new_width, new_height, FilterType::Triangle))
}

// ============================================================================
// RandomAspectPreservingResize
// ============================================================================

/// Like [`AspectPreservingResize`], with the target smaller side drawn
/// uniformly from `[min_side, max_side]` for every image (scale jittering).
#[derive(Debug, Clone)]
pub struct RandomAspectPreservingResize {
    min_side: u32,
    max_side: u32,
}

impl RandomAspectPreservingResize {
    pub fn new(min_side: u32, max_side: u32) -> Result<Self> {
        ensure!(min_side > 0, "min_side must be positive");
        ensure!(
            min_side <= max_side,
            "min_side ({}) must not exceed max_side ({})",
            min_side,
            max_side
        );
        Ok(Self { min_side, max_side })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomAspectPreservingResize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let side = worker_gen_range(self.min_side..=self.max_side);
        resize_smallest_side(img, side)
    }
}

// ============================================================================
// CenterCrop
// ============================================================================

/// Crops the central `height x width` region.
/// Errors if the image is smaller than the crop.
#[derive(Debug, Clone)]
pub struct CenterCrop {
    height: u32,
    width: u32,
}

impl CenterCrop {
    pub fn new(height: u32, width: u32) -> Result<Self> {
        ensure!(
            height > 0 && width > 0,
            "Crop dimensions must be positive (got {}x{})",
            height,
            width
        );
        Ok(Self { height, width })
    }
}

impl Transform<DynamicImage, DynamicImage> for CenterCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        check_crop_fits(width, height, self.width, self.height)?;

        let left = (width - self.width) / 2;
        let top = (height - self.height) / 2;
        Ok(img.crop_imm(left, top, self.width, self.height))
    }
}

// ============================================================================
// RandomCrop
// ============================================================================

/// Crops a `height x width` region at a uniformly random offset.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    height: u32,
    width: u32,
}

impl RandomCrop {
    pub fn new(height: u32, width: u32) -> Result<Self> {
        ensure!(
            height > 0 && width > 0,
            "Crop dimensions must be positive (got {}x{})",
            height,
            width
        );
        Ok(Self { height, width })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        check_crop_fits(width, height, self.width, self.height)?;

        let left = worker_gen_range(0..=width - self.width);
        let top = worker_gen_range(0..=height - self.height);
        Ok(img.crop_imm(left, top, self.width, self.height))
    }
}

fn check_crop_fits(width: u32, height: u32, crop_width: u32, crop_height: u32) -> Result<()> {
    ensure!(
        width >= crop_width && height >= crop_height,
        "Crop size {}x{} exceeds image size {}x{}",
        crop_width,
        crop_height,
        width,
        height
    );
    Ok(())
}
