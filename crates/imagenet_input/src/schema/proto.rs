//! src/schema/proto.rs
//!
//! `tf.train.Example` protobuf messages.
//!
//! Field numbers follow `tensorflow/core/example/{example,feature}.proto`, so
//! records written by TensorFlow decode here and records built with
//! [`ExampleBuilder`] decode in TensorFlow.

use prost::Message;
use std::collections::HashMap;

#[derive(Clone, PartialEq, Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

/// One named feature: a list of bytes, floats or int64s.
#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    use super::{BytesList, FloatList, Int64List};
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(BytesList),
        #[prost(message, tag = "2")]
        FloatList(FloatList),
        #[prost(message, tag = "3")]
        Int64List(Int64List),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

/// Builds serialized `Example` records.
///
/// ```ignore
/// let record = ExampleBuilder::new()
///     .bytes("image/encoded", jpeg_bytes)
///     .bytes("image/format", "jpeg")
///     .int64("image/class/label", 7)
///     .encode();
/// ```
#[derive(Debug, Default, Clone)]
pub struct ExampleBuilder {
    features: HashMap<String, Feature>,
}

impl ExampleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.bytes_list(key, vec![value.into()])
    }

    pub fn bytes_list(self, key: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        self.insert(key, feature::Kind::BytesList(BytesList { value: values }))
    }

    pub fn int64(self, key: impl Into<String>, value: i64) -> Self {
        self.int64_list(key, vec![value])
    }

    pub fn int64_list(self, key: impl Into<String>, values: Vec<i64>) -> Self {
        self.insert(key, feature::Kind::Int64List(Int64List { value: values }))
    }

    pub fn float_list(self, key: impl Into<String>, values: Vec<f32>) -> Self {
        self.insert(key, feature::Kind::FloatList(FloatList { value: values }))
    }

    fn insert(mut self, key: impl Into<String>, kind: feature::Kind) -> Self {
        self.features.insert(key.into(), Feature { kind: Some(kind) });
        self
    }

    pub fn build(self) -> Example {
        Example {
            features: Some(Features {
                feature: self.features,
            }),
        }
    }

    /// Serializes the example to protobuf wire format.
    pub fn encode(self) -> Vec<u8> {
        self.build().encode_to_vec()
    }
}
