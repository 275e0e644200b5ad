//! src/config.rs
//!
//! Configuration for the ImageNet input pipeline.
//!
//! The `ImagenetConfig` struct stores the knobs that control how shards are
//! read, parsed, shuffled and batched. Every field has a default that matches
//! the standard ImageNet input recipe, so `ImagenetConfig::default()` is
//! the usual starting point.
//!
//! Example:
//! ```ignore
//! let config = ImagenetConfig::builder()
//!     .seed(42)
//!     .shuffle_buffer(1500)
//!     .parallel_calls_per_shard(4)
//!     .build();
//! ```
//!
//! Configurations can also be loaded from TOML. Missing keys fall back to
//! their defaults:
//! ```toml
//! image_size = 224
//! shuffle_buffer = 3000
//! seed = 7
//! ```
//!
//! # Memory considerations:
//! - `shuffle_buffer`: holds that many decoded `[224, 224, 3]` f32 images (~600KB each)
//! - `file_shuffle_buffer`: scaled by `num_shards`, holds file paths only
//! - `parallel_calls_per_shard`: scaled by `num_shards`, one worker thread per call

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output height and width of preprocessed images.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;
/// Decoded images always carry three (RGB) channels.
pub const NUM_CHANNELS: u32 = 3;
/// Number of label classes in the ImageNet records (index 0 is background).
pub const LABEL_CLASSES: usize = 1001;
/// Shard-file shuffle buffer, multiplied by `num_shards`.
pub const FILE_SHUFFLE_BUFFER: usize = 1024;
/// Parsed-example shuffle buffer.
pub const SHUFFLE_BUFFER: usize = 1500;
/// Concurrent parse calls per logical shard (device).
pub const PARALLEL_CALLS_PER_SHARD: usize = 4;
/// Number of passes over the data when the caller does not say.
pub const DEFAULT_NUM_EPOCHS: usize = 1;

/// Configuration for `ImagenetDataSet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagenetConfig {
    /// Height and width of the preprocessed image
    pub image_size: u32,
    /// Base shard-file shuffle buffer (multiplied by `num_shards` when training)
    pub file_shuffle_buffer: usize,
    /// Example shuffle buffer applied after parsing when training
    pub shuffle_buffer: usize,
    /// Parse parallelism per shard; total parse calls = `num_shards * parallel_calls_per_shard`
    pub parallel_calls_per_shard: usize,
    /// Seed for shuffling and random augmentation. `None` draws one at construction.
    pub seed: Option<u64>,
    /// Whether to verify the masked CRC32C of every TFRecord frame
    pub verify_checksums: bool,
    /// Whether to drop a trailing batch smaller than the per-shard batch size
    pub drop_remainder: bool,
}

impl Default for ImagenetConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            file_shuffle_buffer: FILE_SHUFFLE_BUFFER,
            shuffle_buffer: SHUFFLE_BUFFER,
            parallel_calls_per_shard: PARALLEL_CALLS_PER_SHARD,
            seed: None,
            verify_checksums: true,
            drop_remainder: false,
        }
    }
}

impl ImagenetConfig {
    pub fn builder() -> ImagenetConfigBuilder {
        ImagenetConfigBuilder::default()
    }

    /// Parses a configuration from a TOML document and validates it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse ImageNet config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Rejects values that would stall or break the pipeline.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.image_size > 0, "image_size must be greater than 0");
        ensure!(
            self.file_shuffle_buffer > 0,
            "file_shuffle_buffer must be greater than 0"
        );
        ensure!(self.shuffle_buffer > 0, "shuffle_buffer must be greater than 0");
        ensure!(
            self.parallel_calls_per_shard > 0,
            "parallel_calls_per_shard must be greater than 0"
        );
        Ok(())
    }
}

/// Builder for ImagenetConfig with method chaining
#[derive(Default)]
pub struct ImagenetConfigBuilder {
    config: ImagenetConfig,
}

impl ImagenetConfigBuilder {
    /// Set the output image height and width
    pub fn image_size(mut self, size: u32) -> Self {
        self.config.image_size = size;
        self
    }

    /// Set the base shard-file shuffle buffer
    pub fn file_shuffle_buffer(mut self, size: usize) -> Self {
        self.config.file_shuffle_buffer = size;
        self
    }

    /// Set the parsed-example shuffle buffer.
    ///
    /// - Larger: better randomness, more memory held in decoded images.
    /// - Smaller: faster start-up, examples from the same shard cluster together.
    pub fn shuffle_buffer(mut self, size: usize) -> Self {
        self.config.shuffle_buffer = size;
        self
    }

    /// Set the number of concurrent parse calls per shard
    pub fn parallel_calls_per_shard(mut self, calls: usize) -> Self {
        self.config.parallel_calls_per_shard = calls;
        self
    }

    /// Set the random seed for reproducible shuffling and augmentation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Enable or disable TFRecord checksum verification
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Set whether to drop the trailing partial batch
    pub fn drop_remainder(mut self, drop: bool) -> Self {
        self.config.drop_remainder = drop;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ImagenetConfig {
        self.config
    }
}
