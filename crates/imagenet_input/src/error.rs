//! src/error.rs

use thiserror::Error;

/// Named failure conditions of the input pipeline.
///
/// Everything else in the crate reports through `anyhow::Result`; these
/// variants travel inside an `anyhow::Error` and can be recovered with
/// `err.downcast_ref::<InputError>()` when a caller needs to branch on them.
#[derive(Error, Debug)]
pub enum InputError {
    /// The batch stream ended before every shard received a batch.
    #[error("Batch stream exhausted after {produced} of {requested} shard batches")]
    ShardStreamExhausted { requested: usize, produced: usize },

    /// `num_shards` is zero or larger than `batch_size`.
    #[error(
        "Cannot split batch_size {batch_size} across {num_shards} shards \
         (per-shard batch size would be zero)"
    )]
    InvalidBatchGeometry { batch_size: usize, num_shards: usize },

    /// A TFRecord frame failed its length or checksum checks.
    #[error("Corrupted record in '{origin}' at byte offset {offset}: {message}")]
    Corrupted {
        origin: String,
        offset: u64,
        message: String,
    },

    /// A feature in an `Example` does not match the declared schema.
    #[error("Feature '{key}': {message}")]
    FeatureMismatch { key: String, message: String },

    /// A pipeline worker thread went away without delivering its result.
    #[error("Pipeline worker failed: {message}")]
    Worker { message: String },
}

impl InputError {
    pub fn corrupted(origin: impl Into<String>, offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            origin: origin.into(),
            offset,
            message: message.into(),
        }
    }

    pub fn feature(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FeatureMismatch {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }
}
