//! src/transforms/vision/conversion.rs

use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channels-last `[H, W, 3]` f32 tensor in [0.0, 1.0].
///
/// Non-RGB8 inputs are converted to RGB first, so the output always has
/// three channels.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?; // 224x224 image -> [224, 224, 3]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );

        let rgb = match img {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };

        // image stores pixels row-major with interleaved channels: already HWC.
        Tensor::from_slice(rgb.as_raw())
            .reshape([height as i64, width as i64, 3])
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("Failed to scale tensor values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_to_tensor_is_hwc_and_scaled() -> Result<()> {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 51, 0]));

        let tensor = ToTensor.apply(DynamicImage::ImageRgb8(img))?;
        assert_eq!(tensor.size(), vec![2, 3, 3]);
        assert_eq!(tensor.kind(), Kind::Float);
        assert!((tensor.double_value(&[1, 2, 0]) - 1.0).abs() < 1e-6);
        assert!((tensor.double_value(&[1, 2, 1]) - 0.2).abs() < 1e-6);
        assert_eq!(tensor.double_value(&[0, 0, 0]), 0.0);
        Ok(())
    }

    #[test]
    fn test_grayscale_becomes_three_channels() -> Result<()> {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255])));
        let tensor = ToTensor.apply(gray)?;
        assert_eq!(tensor.size(), vec![4, 4, 3]);
        assert!((tensor.mean(Kind::Float).double_value(&[]) - 1.0).abs() < 1e-6);
        Ok(())
    }
}
