//! tests/common/mod.rs

#![allow(dead_code)]

use imagenet_input::{filenames, ExampleBuilder, TfRecordWriter};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Encodes a small JPEG whose colours depend on `marker`.
pub fn jpeg_bytes(width: u32, height: u32, marker: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([marker, (x * 7) as u8, (y * 11) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("JPEG encoding of an in-memory image");
    bytes
}

/// A serialized ImageNet record with a 40x30 image.
pub fn record(label: i64) -> Vec<u8> {
    ExampleBuilder::new()
        .bytes("image/encoded", jpeg_bytes(40, 30, label as u8))
        .bytes("image/format", "JPEG")
        .int64("image/class/label", label)
        .bytes("image/class/text", format!("class {}", label))
        .encode()
}

/// Writes one TFRecord shard holding a record per label.
pub fn write_shard(path: &Path, labels: &[i64]) -> Result<()> {
    let mut writer = TfRecordWriter::create(path)?;
    for &label in labels {
        writer.write_record(&record(label))?;
    }
    writer.finish()?;
    Ok(())
}

/// Creates every shard file of a split under `dir`.
///
/// Shards listed in `populated` get one record per label; all others are
/// empty files.
pub fn write_split(
    dir: &Path,
    is_training: bool,
    populated: &[(usize, Vec<i64>)],
) -> Result<Vec<PathBuf>> {
    let paths = filenames(dir, is_training);
    for (index, path) in paths.iter().enumerate() {
        let labels = populated
            .iter()
            .find(|(shard, _)| *shard == index)
            .map(|(_, labels)| labels.as_slice())
            .unwrap_or(&[]);
        write_shard(path, labels)?;
    }
    Ok(paths)
}

/// Flattens per-shard label tensors into plain integers.
pub fn labels_of(labels: &[tch::Tensor]) -> Result<Vec<Vec<i64>>> {
    labels
        .iter()
        .map(|t| Ok(Vec::<i64>::try_from(&t.to_kind(tch::Kind::Int64))?))
        .collect()
}
