//! src/imagenet.rs
//!
//! The ImageNet input function.
//!
//! `ImagenetDataSet` turns a directory of sharded TFRecord files into
//! per-device batches of preprocessed images and labels:
//!
//! ```text
//! shard paths ─► [shuffle files] ─► records ─► parallel parse ─► prefetch
//!            ─► [shuffle examples] ─► repeat ─► batch ─► num_shards pulls
//! ```
//!
//! Steps in brackets only run when training.
//!
//! # Example
//! ```ignore
//! let config = ImagenetConfig::builder().seed(42).build();
//! let dataset = ImagenetDataSet::with_config("/data/imagenet", config)?;
//!
//! // 256 images split over 8 devices: 8 batches of [32, 224, 224, 3]
//! let batch = dataset.make_batch(256, true, 8, None)?;
//! for (images, labels) in batch.images.iter().zip(&batch.labels) {
//!     // one device's share
//! }
//! ```

use anyhow::{ensure, Context, Result};
use image::DynamicImage;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tch::{Device, Tensor};
use tracing::{debug, warn};

use crate::config::{ImagenetConfig, DEFAULT_NUM_EPOCHS, LABEL_CLASSES, NUM_CHANNELS};
use crate::error::InputError;
use crate::example::{ImageBatch, LabeledImage};
use crate::pipeline::{BoxIter, BoxedDataset, Dataset, DatasetExt, InMemoryDataset};
use crate::preprocessing::{Preprocessor, VggPreprocessor};
use crate::schema::ImagenetSchema;
use crate::tfrecord::TfRecordReader;
use crate::transforms::vision::{DecodeImage, EnsureRgb};
use crate::transforms::Transform;

/// Number of training shard files.
pub const TRAIN_SHARDS: usize = 1024;
/// Number of validation shard files.
pub const VALIDATION_SHARDS: usize = 128;

/// Shard file paths for one split, in shard order.
///
/// `train-00000-of-01024` .. `train-01023-of-01024` when training,
/// `validation-00000-of-00128` .. `validation-00127-of-00128` otherwise.
/// Files are not checked for existence.
pub fn filenames(data_dir: impl AsRef<Path>, is_training: bool) -> Vec<PathBuf> {
    let data_dir = data_dir.as_ref();
    if is_training {
        (0..TRAIN_SHARDS)
            .map(|i| data_dir.join(format!("train-{:05}-of-{:05}", i, TRAIN_SHARDS)))
            .collect()
    } else {
        (0..VALIDATION_SHARDS)
            .map(|i| data_dir.join(format!("validation-{:05}-of-{:05}", i, VALIDATION_SHARDS)))
            .collect()
    }
}

// ============================================================================
// RecordParser
// ============================================================================

/// Turns one serialized record into a preprocessed [`LabeledImage`].
///
/// Cheap to clone; clones share the schema and preprocessor.
#[derive(Clone)]
pub struct RecordParser {
    schema: Arc<ImagenetSchema>,
    preprocessor: Arc<dyn Preprocessor>,
    image_size: u32,
}

impl RecordParser {
    pub fn new(preprocessor: Arc<dyn Preprocessor>, image_size: u32) -> Result<Self> {
        ensure!(image_size > 0, "image_size must be greater than 0");
        preprocessor
            .check_output_size(image_size, image_size)
            .with_context(|| format!("Preprocessor cannot produce {0}x{0} images", image_size))?;
        Ok(Self {
            schema: Arc::new(ImagenetSchema::new()?),
            preprocessor,
            image_size,
        })
    }

    /// Parses `value` into an `[image_size, image_size, 3]` f32 image and a
    /// scalar i32 label (`-1` when the record has no label).
    ///
    /// Labels outside `-1..LABEL_CLASSES` are kept as they are but logged.
    pub fn parse(&self, value: &[u8], is_training: bool) -> Result<LabeledImage> {
        let features = self.schema.parse(value)?;

        let image: DynamicImage = DecodeImage.then(EnsureRgb).apply(features.encoded)?;
        let tensor = self
            .preprocessor
            .preprocess(image, self.image_size, self.image_size, is_training)
            .context("Failed to preprocess image")?;

        let expected = [
            self.image_size as i64,
            self.image_size as i64,
            NUM_CHANNELS as i64,
        ];
        ensure!(
            tensor.size() == expected,
            "Preprocessor returned shape {:?}, expected {:?}",
            tensor.size(),
            expected
        );

        if !(-1..LABEL_CLASSES as i64).contains(&features.label) {
            warn!(
                label = features.label,
                num_classes = LABEL_CLASSES,
                "Label outside the ImageNet class range"
            );
        }
        let label = i32::try_from(features.label)
            .with_context(|| format!("Label {} does not fit in i32", features.label))?;
        Ok(LabeledImage::new(tensor, Tensor::from(label)))
    }
}

// ============================================================================
// ShardedBatch
// ============================================================================

/// One batch per shard (device), as produced by
/// [`ImagenetDataSet::make_batch`].
///
/// `images[i]` is `[shard_batch_size, H, W, 3]` and `labels[i]` is
/// `[shard_batch_size]` for every shard `i`.
#[derive(Debug)]
pub struct ShardedBatch {
    pub images: Vec<Tensor>,
    pub labels: Vec<Tensor>,
}

impl ShardedBatch {
    pub fn num_shards(&self) -> usize {
        self.images.len()
    }

    /// Moves every shard to `device`; shard `i` typically goes to device `i`.
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            images: self.images.iter().map(|t| t.to_device(device)).collect(),
            labels: self.labels.iter().map(|t| t.to_device(device)).collect(),
        }
    }
}

// ============================================================================
// ImagenetDataSet
// ============================================================================

/// ImageNet TFRecord dataset rooted at one directory.
pub struct ImagenetDataSet {
    data_dir: PathBuf,
    config: ImagenetConfig,
    seed: u64,
    parser: RecordParser,
}

impl ImagenetDataSet {
    /// Dataset with the default configuration and a random seed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(data_dir, ImagenetConfig::default())
    }

    pub fn with_config(data_dir: impl Into<PathBuf>, config: ImagenetConfig) -> Result<Self> {
        Self::with_config_and_preprocessor(data_dir, config, VggPreprocessor::default())
    }

    /// Dataset with a custom preprocessing policy in place of the VGG one.
    ///
    /// Fails when the preprocessor cannot produce `config.image_size`
    /// outputs (see [`Preprocessor::check_output_size`]).
    pub fn with_config_and_preprocessor(
        data_dir: impl Into<PathBuf>,
        config: ImagenetConfig,
        preprocessor: impl Preprocessor + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let parser = RecordParser::new(Arc::new(preprocessor), config.image_size)?;
        Ok(Self {
            data_dir: data_dir.into(),
            config,
            seed,
            parser,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &ImagenetConfig {
        &self.config
    }

    /// Seed used for shuffling and augmentation (drawn once if not configured).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn filenames(&self, is_training: bool) -> Vec<PathBuf> {
        filenames(&self.data_dir, is_training)
    }

    pub fn parser(&self, value: &[u8], is_training: bool) -> Result<LabeledImage> {
        self.parser.parse(value, is_training)
    }

    /// Builds the full batch stream without pulling from it.
    ///
    /// Each `iter()` on the result is a new pass. Evaluation passes are
    /// identical. Training passes reshuffle files and examples and draw new
    /// augmentations, since every shuffle and parse stage mixes its pass
    /// number into the seed.
    pub fn input_pipeline(
        &self,
        batch_size: usize,
        is_training: bool,
        num_shards: usize,
        num_epochs: Option<usize>,
    ) -> Result<BoxedDataset<ImageBatch>> {
        let shard_batch_size = shard_batch_size(batch_size, num_shards)?;
        let num_epochs = num_epochs.unwrap_or(DEFAULT_NUM_EPOCHS);
        let num_parallel_calls = num_shards * self.config.parallel_calls_per_shard;
        let file_shuffle_buffer = self.config.file_shuffle_buffer * num_shards;

        debug!(
            data_dir = %self.data_dir.display(),
            is_training,
            batch_size,
            num_shards,
            shard_batch_size,
            num_epochs,
            num_parallel_calls,
            seed = self.seed,
            "Building ImageNet input pipeline"
        );

        let files = InMemoryDataset::new(self.filenames(is_training));
        let files = if is_training {
            debug!(buffer_size = file_shuffle_buffer, "Shuffling shard files");
            files.shuffle(file_shuffle_buffer, self.seed)?.boxed()
        } else {
            files.boxed()
        };

        let verify_checksums = self.config.verify_checksums;
        let parser = self.parser.clone();
        let examples = files
            .flat_map(move |path: PathBuf| -> Result<BoxIter<Vec<u8>>> {
                Ok(Box::new(TfRecordReader::open(&path, verify_checksums)?))
            })
            .parallel_map(
                move |record: Vec<u8>| parser.parse(&record, is_training),
                num_parallel_calls,
                self.seed,
            )?
            .prefetch(batch_size);

        let examples = if is_training {
            debug!(buffer_size = self.config.shuffle_buffer, "Shuffling examples");
            examples
                .shuffle(self.config.shuffle_buffer, self.seed.wrapping_add(1))?
                .boxed()
        } else {
            examples.boxed()
        };

        Ok(examples
            .repeat(Some(num_epochs))
            .batch(shard_batch_size, self.config.drop_remainder)?
            .map(ImageBatch::collate)
            .boxed())
    }

    /// Streams training steps: each item holds the next batch for every one
    /// of `num_shards` devices.
    ///
    /// The pipeline is built once, so consecutive steps walk through the
    /// epochs. The stream ends cleanly when the data runs out at a step
    /// boundary; running out part-way through a step (or before the first
    /// step) yields [`InputError::ShardStreamExhausted`]. Any error ends the
    /// stream.
    ///
    /// ```ignore
    /// for step in dataset.sharded_batches(256, true, 8, Some(90))? {
    ///     let step = step?;
    ///     // step.images[i] goes to device i
    /// }
    /// ```
    pub fn sharded_batches(
        &self,
        batch_size: usize,
        is_training: bool,
        num_shards: usize,
        num_epochs: Option<usize>,
    ) -> Result<ShardedBatches> {
        let batches = self.input_pipeline(batch_size, is_training, num_shards, num_epochs)?;
        Ok(ShardedBatches {
            batches: batches.iter()?,
            num_shards,
            steps: 0,
            done: false,
        })
    }

    /// Pulls one batch for each of `num_shards` devices.
    ///
    /// This is the first step of [`sharded_batches`](Self::sharded_batches).
    /// Every call builds a fresh pipeline, so with a fixed seed repeated
    /// calls return the same batches; use `sharded_batches` to step through
    /// the data.
    pub fn make_batch(
        &self,
        batch_size: usize,
        is_training: bool,
        num_shards: usize,
        num_epochs: Option<usize>,
    ) -> Result<ShardedBatch> {
        self.sharded_batches(batch_size, is_training, num_shards, num_epochs)?
            .next()
            .unwrap_or_else(|| {
                Err(InputError::ShardStreamExhausted {
                    requested: num_shards,
                    produced: 0,
                }
                .into())
            })
    }
}

// ============================================================================
// ShardedBatches
// ============================================================================

/// Step iterator returned by [`ImagenetDataSet::sharded_batches`].
pub struct ShardedBatches {
    batches: BoxIter<ImageBatch>,
    num_shards: usize,
    steps: usize,
    done: bool,
}

impl ShardedBatches {
    /// Steps produced so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Iterator for ShardedBatches {
    type Item = Result<ShardedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut images = Vec::with_capacity(self.num_shards);
        let mut labels = Vec::with_capacity(self.num_shards);
        for shard in 0..self.num_shards {
            match self.batches.next() {
                Some(Ok(batch)) => {
                    let (shard_images, shard_labels) = batch.into_parts();
                    images.push(shard_images);
                    labels.push(shard_labels);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.context(format!(
                        "Failed to produce batch for shard {} of step {}",
                        shard, self.steps
                    ))));
                }
                None => {
                    self.done = true;
                    if shard == 0 && self.steps > 0 {
                        return None;
                    }
                    return Some(Err(InputError::ShardStreamExhausted {
                        requested: self.num_shards,
                        produced: shard,
                    }
                    .into()));
                }
            }
        }

        self.steps += 1;
        Some(Ok(ShardedBatch { images, labels }))
    }
}

/// `batch_size / num_shards`, truncating.
fn shard_batch_size(batch_size: usize, num_shards: usize) -> Result<usize> {
    if num_shards == 0 || batch_size < num_shards {
        return Err(InputError::InvalidBatchGeometry {
            batch_size,
            num_shards,
        }
        .into());
    }
    let shard_batch_size = batch_size / num_shards;
    let dropped = batch_size % num_shards;
    if dropped != 0 {
        warn!(
            batch_size,
            num_shards,
            shard_batch_size,
            dropped,
            "batch_size is not divisible by num_shards; {} examples per step are not used",
            dropped
        );
    }
    Ok(shard_batch_size)
}
