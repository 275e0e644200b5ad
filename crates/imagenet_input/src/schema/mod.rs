//! src/schema/mod.rs
//!
//! Typed parsing of serialized `Example` records.
//!
//! A [`FeatureSpec`] declares how one key is read:
//! - `FixedLen`: exactly one value of the declared type. A missing key takes
//!   the default; a missing key without a default is an error.
//! - `VarLen`: any number of values. A missing key reads as empty.
//!
//! In both cases a present key whose list has the wrong type is an error.
//! [`ImagenetSchema`] is the fixed schema of ImageNet training records.

pub mod proto;

use anyhow::{anyhow, bail, Context, Result};
use prost::Message;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::InputError;
pub use proto::ExampleBuilder;
use proto::{feature::Kind, Example, Feature};

/// Element type of a feature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// Bytes list
    String,
    Int64,
    Float32,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::String => "bytes",
            DType::Int64 => "int64",
            DType::Float32 => "float",
        };
        f.write_str(name)
    }
}

/// Default for an absent fixed-length feature.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Bytes(Vec<u8>),
    Int64(i64),
    Float32(f32),
}

impl DefaultValue {
    pub fn dtype(&self) -> DType {
        match self {
            DefaultValue::Bytes(_) => DType::String,
            DefaultValue::Int64(_) => DType::Int64,
            DefaultValue::Float32(_) => DType::Float32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSpec {
    FixedLen {
        key: &'static str,
        dtype: DType,
        default: Option<DefaultValue>,
    },
    VarLen {
        key: &'static str,
        dtype: DType,
    },
}

impl FeatureSpec {
    pub fn fixed(key: &'static str, dtype: DType, default: Option<DefaultValue>) -> Self {
        FeatureSpec::FixedLen { key, dtype, default }
    }

    pub fn var(key: &'static str, dtype: DType) -> Self {
        FeatureSpec::VarLen { key, dtype }
    }

    pub fn key(&self) -> &'static str {
        match self {
            FeatureSpec::FixedLen { key, .. } | FeatureSpec::VarLen { key, .. } => key,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            FeatureSpec::FixedLen { dtype, .. } | FeatureSpec::VarLen { dtype, .. } => *dtype,
        }
    }

    fn default(&self) -> Option<&DefaultValue> {
        match self {
            FeatureSpec::FixedLen { default, .. } => default.as_ref(),
            FeatureSpec::VarLen { .. } => None,
        }
    }

    /// Looks up this feature, checking the list type.
    fn values<'a>(&self, features: &'a HashMap<String, Feature>) -> Result<Option<Values<'a>>> {
        let Some(feature) = features.get(self.key()) else {
            return Ok(None);
        };
        let values = match &feature.kind {
            Some(Kind::BytesList(list)) => Values::Bytes(&list.value),
            Some(Kind::Int64List(list)) => Values::Int64(&list.value),
            Some(Kind::FloatList(list)) => Values::Float32(&list.value),
            // A feature with no list set holds zero values.
            None => Values::empty(self.dtype()),
        };
        if values.dtype() != self.dtype() {
            return Err(self.mismatch(format!(
                "expected {} list, found {} list",
                self.dtype(),
                values.dtype()
            )));
        }
        Ok(Some(values))
    }

    fn mismatch(&self, message: impl Into<String>) -> anyhow::Error {
        anyhow!(InputError::feature(self.key(), message))
    }

    fn single<'a, T>(&self, values: &'a [T]) -> Result<&'a T> {
        match values {
            [value] => Ok(value),
            _ => Err(self.mismatch(format!(
                "fixed-length feature must hold exactly 1 value, found {}",
                values.len()
            ))),
        }
    }

    fn missing(&self) -> anyhow::Error {
        self.mismatch("required feature is missing and has no default")
    }

    fn read_fixed_bytes(&self, features: &HashMap<String, Feature>) -> Result<Vec<u8>> {
        match (self.values(features)?, self.default()) {
            (Some(Values::Bytes(values)), _) => Ok(self.single(values)?.clone()),
            (None, Some(DefaultValue::Bytes(default))) => Ok(default.clone()),
            (None, _) => Err(self.missing()),
            (Some(_), _) => Err(self.mismatch("expected bytes list")),
        }
    }

    fn read_fixed_int64(&self, features: &HashMap<String, Feature>) -> Result<i64> {
        match (self.values(features)?, self.default()) {
            (Some(Values::Int64(values)), _) => Ok(*self.single(values)?),
            (None, Some(DefaultValue::Int64(default))) => Ok(*default),
            (None, _) => Err(self.missing()),
            (Some(_), _) => Err(self.mismatch("expected int64 list")),
        }
    }

    fn read_var_float(&self, features: &HashMap<String, Feature>) -> Result<Vec<f32>> {
        match self.values(features)? {
            Some(Values::Float32(values)) => Ok(values.to_vec()),
            None => Ok(Vec::new()),
            Some(_) => Err(self.mismatch("expected float list")),
        }
    }

    fn read_var_int64(&self, features: &HashMap<String, Feature>) -> Result<Vec<i64>> {
        match self.values(features)? {
            Some(Values::Int64(values)) => Ok(values.to_vec()),
            None => Ok(Vec::new()),
            Some(_) => Err(self.mismatch("expected int64 list")),
        }
    }
}

enum Values<'a> {
    Bytes(&'a [Vec<u8>]),
    Int64(&'a [i64]),
    Float32(&'a [f32]),
}

impl Values<'_> {
    fn empty(dtype: DType) -> Self {
        match dtype {
            DType::String => Values::Bytes(&[]),
            DType::Int64 => Values::Int64(&[]),
            DType::Float32 => Values::Float32(&[]),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            Values::Bytes(_) => DType::String,
            Values::Int64(_) => DType::Int64,
            Values::Float32(_) => DType::Float32,
        }
    }
}

/// Per-record object bounding boxes, in normalized coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingBoxes {
    pub xmin: Vec<f32>,
    pub ymin: Vec<f32>,
    pub xmax: Vec<f32>,
    pub ymax: Vec<f32>,
}

/// All fields of one ImageNet record.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagenetFeatures {
    /// Encoded image bytes (JPEG, PNG, ...)
    pub encoded: Vec<u8>,
    pub format: String,
    /// Class index; `-1` when the record has none.
    pub label: i64,
    pub class_text: String,
    pub bbox: BoundingBoxes,
    pub object_labels: Vec<i64>,
}

/// The feature layout of ImageNet TFRecords.
#[derive(Debug, Clone)]
pub struct ImagenetSchema {
    encoded: FeatureSpec,
    format: FeatureSpec,
    label: FeatureSpec,
    class_text: FeatureSpec,
    bbox_xmin: FeatureSpec,
    bbox_ymin: FeatureSpec,
    bbox_xmax: FeatureSpec,
    bbox_ymax: FeatureSpec,
    object_label: FeatureSpec,
}

impl ImagenetSchema {
    pub fn new() -> Result<Self> {
        let schema = Self {
            encoded: FeatureSpec::fixed(
                "image/encoded",
                DType::String,
                Some(DefaultValue::Bytes(Vec::new())),
            ),
            format: FeatureSpec::fixed(
                "image/format",
                DType::String,
                Some(DefaultValue::Bytes(b"jpeg".to_vec())),
            ),
            label: FeatureSpec::fixed(
                "image/class/label",
                DType::Int64,
                Some(DefaultValue::Int64(-1)),
            ),
            class_text: FeatureSpec::fixed(
                "image/class/text",
                DType::String,
                Some(DefaultValue::Bytes(Vec::new())),
            ),
            bbox_xmin: FeatureSpec::var("image/object/bbox/xmin", DType::Float32),
            bbox_ymin: FeatureSpec::var("image/object/bbox/ymin", DType::Float32),
            bbox_xmax: FeatureSpec::var("image/object/bbox/xmax", DType::Float32),
            bbox_ymax: FeatureSpec::var("image/object/bbox/ymax", DType::Float32),
            object_label: FeatureSpec::var("image/object/class/label", DType::Int64),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn specs(&self) -> [&FeatureSpec; 9] {
        [
            &self.encoded,
            &self.format,
            &self.label,
            &self.class_text,
            &self.bbox_xmin,
            &self.bbox_ymin,
            &self.bbox_xmax,
            &self.bbox_ymax,
            &self.object_label,
        ]
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in self.specs() {
            if !seen.insert(spec.key()) {
                bail!("Duplicate feature key in schema: {}", spec.key());
            }
            if let Some(default) = spec.default() {
                if default.dtype() != spec.dtype() {
                    bail!(
                        "Default for '{}' is {} but the feature is declared {}",
                        spec.key(),
                        default.dtype(),
                        spec.dtype()
                    );
                }
            }
        }
        Ok(())
    }

    /// Decodes one serialized `Example` and reads every declared feature.
    pub fn parse(&self, record: &[u8]) -> Result<ImagenetFeatures> {
        let example = Example::decode(record).context("Failed to decode Example record")?;
        let features = example.features.map(|f| f.feature).unwrap_or_default();

        Ok(ImagenetFeatures {
            encoded: self.encoded.read_fixed_bytes(&features)?,
            format: String::from_utf8_lossy(&self.format.read_fixed_bytes(&features)?).into_owned(),
            label: self.label.read_fixed_int64(&features)?,
            class_text: String::from_utf8_lossy(&self.class_text.read_fixed_bytes(&features)?)
                .into_owned(),
            bbox: BoundingBoxes {
                xmin: self.bbox_xmin.read_var_float(&features)?,
                ymin: self.bbox_ymin.read_var_float(&features)?,
                xmax: self.bbox_xmax.read_var_float(&features)?,
                ymax: self.bbox_ymax.read_var_float(&features)?,
            },
            object_labels: self.object_label.read_var_int64(&features)?,
        })
    }
}
