//! src/transforms/vision/photometric.rs

use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

/// VGG per-channel RGB means on the 0-255 scale.
pub const VGG_MEANS: [f32; 3] = [123.68, 116.78, 103.94];

// ============================================================================
// MeanSubtraction
// ============================================================================

/// Subtracts a per-channel mean from a channels-last tensor.
///
/// ```text
/// output[h, w, c] = input[h, w, c] - means[c]
/// ```
///
/// # Example
/// ```ignore
/// let centered = MeanSubtraction::vgg().apply(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct MeanSubtraction {
    means: Vec<f32>,
}

impl MeanSubtraction {
    pub fn new(means: &[f32]) -> Result<Self> {
        ensure!(!means.is_empty(), "Channel means cannot be empty");
        Ok(Self {
            means: means.to_vec(),
        })
    }

    /// VGG means rescaled to the [0, 1] range that `ToTensor` produces.
    pub fn vgg() -> Self {
        Self {
            means: VGG_MEANS.iter().map(|m| m / 255.0).collect(),
        }
    }

    pub fn means(&self) -> &[f32] {
        &self.means
    }
}

impl Transform<Tensor, Tensor> for MeanSubtraction {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (_height, _width, num_channels) = tensor
            .size3()
            .context("Input must be 3D tensor [H, W, C]")?;

        ensure!(
            num_channels as usize == self.means.len(),
            "Channel count mismatch: input has {} channels but {} means were given",
            num_channels,
            self.means.len()
        );

        let means = Tensor::from_slice(&self.means)
            .reshape([1, 1, num_channels])
            .to_kind(tensor.kind());
        Ok(tensor - means)
    }
}
