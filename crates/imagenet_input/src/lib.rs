//! src/lib.rs
//!
//! Streaming ImageNet input pipeline over TFRecord shards.

pub mod config;
pub mod error;
pub mod example;
pub mod imagenet;
pub mod pipeline;
pub mod preprocessing;
pub mod schema;
pub mod tfrecord;
pub mod transforms;

pub use config::ImagenetConfig;
pub use error::InputError;
pub use example::{ImageBatch, LabeledImage};
pub use imagenet::{filenames, ImagenetDataSet, RecordParser, ShardedBatch, ShardedBatches};
pub use pipeline::{BoxIter, BoxedDataset, Dataset, DatasetExt, InMemoryDataset};
pub use preprocessing::{Preprocessor, VggPreprocessor};
pub use schema::{ExampleBuilder, ImagenetFeatures, ImagenetSchema};
pub use tfrecord::{TfRecordReader, TfRecordWriter};
