//! src/preprocessing.rs
//!
//! Image preprocessing applied after decoding.
//!
//! `Preprocessor` is the seam between record parsing and the image
//! pipeline: the parser hands it a decoded RGB image and gets back a
//! `[output_height, output_width, 3]` f32 tensor. `VggPreprocessor` is the
//! standard VGG/ResNet recipe:
//!
//! - training: resize smaller side to U[256, 512], random crop, random flip,
//!   tensor, mean subtraction
//! - evaluation: resize smaller side to 256, center crop, tensor, mean
//!   subtraction

use anyhow::{ensure, Result};
use image::DynamicImage;
use tch::Tensor;

use crate::transforms::vision::{
    AspectPreservingResize, CenterCrop, MeanSubtraction, RandomAspectPreservingResize, RandomCrop,
    RandomHorizontalFlip, ToTensor,
};
use crate::transforms::Transform;

/// Smaller side after resizing, lower bound (and the evaluation size).
pub const RESIZE_SIDE_MIN: u32 = 256;
/// Smaller side after resizing, upper bound for training scale jitter.
pub const RESIZE_SIDE_MAX: u32 = 512;

/// Turns a decoded image into a model-ready tensor.
///
/// Implementations run on pipeline worker threads; any randomness should
/// come from `crate::pipeline::thread` so results are reproducible.
pub trait Preprocessor: Send + Sync {
    /// Checks once, before any record is parsed, that `preprocess` can
    /// produce outputs of this size.
    fn check_output_size(&self, _output_height: u32, _output_width: u32) -> Result<()> {
        Ok(())
    }

    fn preprocess(
        &self,
        image: DynamicImage,
        output_height: u32,
        output_width: u32,
        is_training: bool,
    ) -> Result<Tensor>;
}

#[derive(Debug, Clone)]
pub struct VggPreprocessor {
    resize_side_min: u32,
    resize_side_max: u32,
    flip: RandomHorizontalFlip,
    means: MeanSubtraction,
}

impl Default for VggPreprocessor {
    fn default() -> Self {
        Self {
            resize_side_min: RESIZE_SIDE_MIN,
            resize_side_max: RESIZE_SIDE_MAX,
            flip: RandomHorizontalFlip::default(),
            means: MeanSubtraction::vgg(),
        }
    }
}

impl VggPreprocessor {
    /// Custom scale-jitter range; evaluation resizes to `resize_side_min`.
    pub fn new(resize_side_min: u32, resize_side_max: u32) -> Result<Self> {
        // Validates the range.
        RandomAspectPreservingResize::new(resize_side_min, resize_side_max)?;
        Ok(Self {
            resize_side_min,
            resize_side_max,
            ..Self::default()
        })
    }

    fn train_transform(
        &self,
        output_height: u32,
        output_width: u32,
    ) -> Result<impl Transform<DynamicImage, Tensor>> {
        Ok(
            RandomAspectPreservingResize::new(self.resize_side_min, self.resize_side_max)?
                .then(RandomCrop::new(output_height, output_width)?)
                .then(self.flip.clone())
                .then(ToTensor)
                .then(self.means.clone()),
        )
    }

    fn eval_transform(
        &self,
        output_height: u32,
        output_width: u32,
    ) -> Result<impl Transform<DynamicImage, Tensor>> {
        Ok(AspectPreservingResize::new(self.resize_side_min)?
            .then(CenterCrop::new(output_height, output_width)?)
            .then(ToTensor)
            .then(self.means.clone()))
    }
}

impl Preprocessor for VggPreprocessor {
    /// Crops are taken after resizing the smaller side to at least
    /// `resize_side_min`, so neither output side may exceed it.
    fn check_output_size(&self, output_height: u32, output_width: u32) -> Result<()> {
        ensure!(
            output_height <= self.resize_side_min && output_width <= self.resize_side_min,
            "Output size {}x{} exceeds resize_side_min {}",
            output_height,
            output_width,
            self.resize_side_min
        );
        Ok(())
    }

    fn preprocess(
        &self,
        image: DynamicImage,
        output_height: u32,
        output_width: u32,
        is_training: bool,
    ) -> Result<Tensor> {
        if is_training {
            self.train_transform(output_height, output_width)?.apply(image)
        } else {
            self.eval_transform(output_height, output_width)?.apply(image)
        }
    }
}
