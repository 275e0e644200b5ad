//! src/example.rs

use anyhow::{bail, Result};
use tch::{Device, Tensor};

/// A single parsed example: one preprocessed image and its class label.
///
/// - `image`: `f32` tensor of shape `[height, width, channels]` (e.g. `[224, 224, 3]`)
/// - `label`: scalar (0-dim) `i32` tensor. `-1` means the record carried no label.
#[derive(Debug)]
pub struct LabeledImage {
    pub image: Tensor,
    pub label: Tensor,
}

/// Creates a shallow clone: both copies share tensor storage.
impl Clone for LabeledImage {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            label: self.label.shallow_clone(),
        }
    }
}

impl LabeledImage {
    pub fn new(image: Tensor, label: Tensor) -> Self {
        Self { image, label }
    }

    /// Returns the label as an integer.
    pub fn label_value(&self) -> i64 {
        self.label.int64_value(&[])
    }
}

/// A batch of [`LabeledImage`]s stacked along a new leading dimension.
///
/// - `images`: `[batch, height, width, channels]`
/// - `labels`: `[batch]`
///
/// # Example
/// Stacking 8 examples with images of shape `[224, 224, 3]` gives
/// `images` of shape `[8, 224, 224, 3]` and `labels` of shape `[8]`.
#[derive(Debug)]
pub struct ImageBatch {
    pub images: Tensor,
    pub labels: Tensor,
}

impl ImageBatch {
    /// Stacks examples into a batch.
    ///
    /// All images must share one shape and all labels must share one shape;
    /// otherwise an error names the first offending example.
    pub fn collate(examples: Vec<LabeledImage>) -> Result<Self> {
        if examples.is_empty() {
            bail!("Cannot collate empty example list");
        }

        let image_shape = examples[0].image.size();
        let label_shape = examples[0].label.size();
        for (i, example) in examples.iter().enumerate().skip(1) {
            if example.image.size() != image_shape {
                bail!(
                    "Image shape mismatch in example {}: expected {:?}, got {:?}",
                    i,
                    image_shape,
                    example.image.size()
                );
            }
            if example.label.size() != label_shape {
                bail!(
                    "Label shape mismatch in example {}: expected {:?}, got {:?}",
                    i,
                    label_shape,
                    example.label.size()
                );
            }
        }

        let images: Vec<&Tensor> = examples.iter().map(|e| &e.image).collect();
        let labels: Vec<&Tensor> = examples.iter().map(|e| &e.label).collect();
        Ok(Self {
            images: Tensor::stack(&images, 0),
            labels: Tensor::stack(&labels, 0),
        })
    }

    /// Returns the number of examples in the batch.
    pub fn batch_size(&self) -> i64 {
        self.images.size()[0]
    }

    /// Copies the label tensor out as integers.
    pub fn label_values(&self) -> Result<Vec<i64>> {
        Ok(Vec::<i64>::try_from(&self.labels.to_kind(tch::Kind::Int64))?)
    }

    /// Transfers both tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            images: self.images.to_device(device),
            labels: self.labels.to_device(device),
        }
    }

    pub fn into_parts(self) -> (Tensor, Tensor) {
        (self.images, self.labels)
    }
}
