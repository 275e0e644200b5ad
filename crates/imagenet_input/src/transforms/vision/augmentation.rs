//! src/transforms/vision/augmentation.rs

use crate::pipeline::thread::worker_gen_bool;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops, DynamicImage};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Randomly mirrors images left to right during training.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?; // 50% flip chance
/// let augmented = flip.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

/// Flips half of the images.
impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }

    fn flip(img: DynamicImage) -> DynamicImage {
        match img {
            DynamicImage::ImageRgb8(mut rgb) => {
                imageops::flip_horizontal_in_place(&mut rgb);
                DynamicImage::ImageRgb8(rgb)
            }
            _ => img.fliph(),
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let flip = match self.p {
            p if p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => worker_gen_bool(p),
        };
        Ok(if flip { Self::flip(img) } else { img })
    }
}
