//! tests/imagenet_pipeline.rs
//!
//! End-to-end tests for `ImagenetDataSet` over synthetic shard directories.
//!
//! Tests cover:
//! - Shard path enumeration
//! - Record parsing (shapes, dtypes, default label)
//! - make_batch geometry, truncation and error cases
//! - Evaluation order and determinism
//! - Training reproducibility for a fixed seed
//! - Corrupted and missing shard files

mod common;
use common::{labels_of, record, write_split};

use imagenet_input::tfrecord::HEADER_LEN;
use imagenet_input::{Dataset, ImagenetConfig, ImagenetDataSet, InputError};

use anyhow::Result;
use std::collections::HashSet;
use tch::Kind;
use tempfile::tempdir;

fn seeded(dir: &std::path::Path, seed: u64) -> Result<ImagenetDataSet> {
    ImagenetDataSet::with_config(dir, ImagenetConfig::builder().seed(seed).build())
}

// ============================================================================
// filenames / parser
// ============================================================================

#[test]
fn test_filenames_join_data_dir() -> Result<()> {
    let dir = tempdir()?;
    let dataset = seeded(dir.path(), 0)?;

    let train = dataset.filenames(true);
    assert_eq!(train.len(), 1024);
    assert_eq!(train[0], dir.path().join("train-00000-of-01024"));
    assert_eq!(train[1023], dir.path().join("train-01023-of-01024"));

    let validation = dataset.filenames(false);
    assert_eq!(validation.len(), 128);
    assert_eq!(validation[0], dir.path().join("validation-00000-of-00128"));
    assert_eq!(validation[127], dir.path().join("validation-00127-of-00128"));
    Ok(())
}

#[test]
fn test_parser_produces_image_and_label() -> Result<()> {
    let dir = tempdir()?;
    let dataset = seeded(dir.path(), 0)?;

    let example = dataset.parser(&record(7), true)?;
    assert_eq!(example.image.size(), vec![224, 224, 3]);
    assert_eq!(example.image.kind(), Kind::Float);
    assert_eq!(example.label_value(), 7);
    Ok(())
}

#[test]
fn test_parser_rejects_garbage() -> Result<()> {
    let dir = tempdir()?;
    let dataset = seeded(dir.path(), 0)?;
    assert!(dataset.parser(&[0xde, 0xad, 0xbe, 0xef], false).is_err());
    Ok(())
}

// ============================================================================
// make_batch geometry
// ============================================================================

#[test]
fn test_training_batch_shapes() -> Result<()> {
    let dir = tempdir()?;
    write_split(
        dir.path(),
        true,
        &[(3, (0..20).collect()), (700, (20..40).collect())],
    )?;
    let dataset = seeded(dir.path(), 42)?;

    let batch = dataset.make_batch(32, true, 4, None)?;
    assert_eq!(batch.num_shards(), 4);
    for (images, labels) in batch.images.iter().zip(&batch.labels) {
        assert_eq!(images.size(), vec![8, 224, 224, 3]);
        assert_eq!(images.kind(), Kind::Float);
        assert_eq!(labels.size(), vec![8]);
        assert_eq!(labels.kind(), Kind::Int);
    }

    // 32 distinct examples drawn from the 40 written.
    let seen: Vec<i64> = labels_of(&batch.labels)?.into_iter().flatten().collect();
    let unique: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 32);
    assert!(seen.iter().all(|l| (0..40).contains(l)));
    Ok(())
}

#[test]
fn test_truncating_shard_split() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(0, (0..40).collect())])?;
    let dataset = seeded(dir.path(), 1)?;

    // 33 / 4 = 8 per shard; one example per step is not used.
    let batch = dataset.make_batch(33, false, 4, None)?;
    assert_eq!(batch.num_shards(), 4);
    assert!(batch.images.iter().all(|t| t.size()[0] == 8));
    Ok(())
}

#[test]
fn test_invalid_geometry() -> Result<()> {
    let dir = tempdir()?;
    let dataset = seeded(dir.path(), 1)?;

    for (batch_size, num_shards) in [(2, 4), (8, 0)] {
        let err = dataset
            .make_batch(batch_size, false, num_shards, None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::InvalidBatchGeometry { .. })
        ));
    }
    Ok(())
}

#[test]
fn test_exhausted_stream() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(0, vec![0, 1, 2])])?;
    let dataset = seeded(dir.path(), 1)?;

    let err = dataset.make_batch(4, false, 4, None).unwrap_err();
    match err.downcast_ref::<InputError>() {
        Some(InputError::ShardStreamExhausted {
            requested,
            produced,
        }) => {
            assert_eq!(*requested, 4);
            assert_eq!(*produced, 3);
        }
        other => panic!("expected ShardStreamExhausted, got {:?}", other),
    }
    Ok(())
}

// ============================================================================
// Ordering and determinism
// ============================================================================

#[test]
fn test_eval_order_is_file_order_and_repeatable() -> Result<()> {
    let dir = tempdir()?;
    write_split(
        dir.path(),
        false,
        &[(0, vec![10, 11, 12]), (1, vec![20, 21]), (5, vec![30, 31, 32])],
    )?;
    let dataset = seeded(dir.path(), 9)?;

    let first = dataset.make_batch(8, false, 2, None)?;
    assert_eq!(
        labels_of(&first.labels)?,
        vec![vec![10, 11, 12, 20], vec![21, 30, 31, 32]]
    );

    let second = dataset.make_batch(8, false, 2, None)?;
    for (a, b) in first.images.iter().zip(&second.images) {
        assert!(a.equal(b));
    }
    Ok(())
}

#[test]
fn test_epochs_wrap_around() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(2, vec![0, 1, 2])])?;
    let dataset = seeded(dir.path(), 3)?;

    let batch = dataset.make_batch(6, false, 1, Some(2))?;
    assert_eq!(labels_of(&batch.labels)?, vec![vec![0, 1, 2, 0, 1, 2]]);

    // One epoch leaves a short final batch.
    let batch = dataset.make_batch(6, false, 1, None)?;
    assert_eq!(labels_of(&batch.labels)?, vec![vec![0, 1, 2]]);
    Ok(())
}

#[test]
fn test_drop_remainder_config() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(0, vec![0, 1, 2])])?;
    let config = ImagenetConfig::builder().seed(3).drop_remainder(true).build();
    let dataset = ImagenetDataSet::with_config(dir.path(), config)?;

    let err = dataset.make_batch(4, false, 1, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::ShardStreamExhausted { produced: 0, .. })
    ));
    Ok(())
}

#[test]
fn test_training_reproducible_for_seed() -> Result<()> {
    let dir = tempdir()?;
    write_split(
        dir.path(),
        true,
        &[(0, (0..12).collect()), (512, (12..24).collect())],
    )?;

    let a = seeded(dir.path(), 1234)?.make_batch(8, true, 2, None)?;
    let b = seeded(dir.path(), 1234)?.make_batch(8, true, 2, None)?;
    assert_eq!(labels_of(&a.labels)?, labels_of(&b.labels)?);
    for (x, y) in a.images.iter().zip(&b.images) {
        assert!(x.equal(y));
    }

    let c = seeded(dir.path(), 4321)?.make_batch(8, true, 2, None)?;
    let same_images = a.images.iter().zip(&c.images).all(|(x, y)| x.equal(y));
    assert!(!same_images);
    Ok(())
}

#[test]
fn test_input_pipeline_streams_all_examples() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), true, &[(9, (0..10).collect())])?;
    let dataset = seeded(dir.path(), 5)?;

    let batches = dataset.input_pipeline(4, true, 2, Some(1))?;
    let mut labels = Vec::new();
    for batch in batches.iter()? {
        labels.extend(batch?.label_values()?);
    }
    labels.sort_unstable();
    assert_eq!(labels, (0..10).collect::<Vec<i64>>());
    Ok(())
}

// ============================================================================
// Streaming steps
// ============================================================================

#[test]
fn test_consecutive_steps_advance_through_data() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), true, &[(17, (0..40).collect())])?;
    let dataset = seeded(dir.path(), 8)?;

    let mut steps = dataset.sharded_batches(8, true, 2, None)?;
    let first: HashSet<i64> = labels_of(&steps.next().unwrap()?.labels)?
        .into_iter()
        .flatten()
        .collect();
    let second: HashSet<i64> = labels_of(&steps.next().unwrap()?.labels)?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(steps.steps(), 2);

    // Both steps are drawn from one pass, so no example repeats.
    assert_eq!(first.len(), 8);
    assert_eq!(second.len(), 8);
    assert!(first.is_disjoint(&second));

    // make_batch is the first step of a fresh stream.
    let again = dataset.make_batch(8, true, 2, None)?;
    let again: HashSet<i64> = labels_of(&again.labels)?.into_iter().flatten().collect();
    assert_eq!(again, first);
    Ok(())
}

#[test]
fn test_steps_end_at_step_boundary() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(0, (0..8).collect())])?;
    let dataset = seeded(dir.path(), 2)?;

    // 8 examples, 2 per shard batch, 2 shards: exactly two steps.
    let steps: Vec<Vec<Vec<i64>>> = dataset
        .sharded_batches(4, false, 2, None)?
        .map(|step| labels_of(&step?.labels))
        .collect::<Result<_>>()?;
    assert_eq!(steps, vec![vec![vec![0, 1], vec![2, 3]], vec![vec![4, 5], vec![6, 7]]]);

    // A second epoch keeps the stream going.
    assert_eq!(dataset.sharded_batches(4, false, 2, Some(2))?.count(), 4);
    Ok(())
}

#[test]
fn test_steps_short_of_a_full_step_report_exhaustion() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), false, &[(0, (0..10).collect())])?;
    let dataset = seeded(dir.path(), 2)?;

    let mut steps = dataset.sharded_batches(4, false, 2, None)?;
    steps.next().unwrap()?;
    steps.next().unwrap()?;
    let err = steps.next().unwrap().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::ShardStreamExhausted {
            requested: 2,
            produced: 1
        })
    ));
    assert!(steps.next().is_none());
    Ok(())
}

#[test]
fn test_input_pipeline_passes() -> Result<()> {
    let dir = tempdir()?;
    write_split(dir.path(), true, &[(100, (0..20).collect())])?;
    write_split(dir.path(), false, &[(3, (0..20).collect())])?;
    let dataset = seeded(dir.path(), 6)?;

    let pass = |batches: &imagenet_input::BoxedDataset<imagenet_input::ImageBatch>| {
        let mut labels = Vec::new();
        for batch in batches.iter()? {
            labels.extend(batch?.label_values()?);
        }
        Ok::<_, anyhow::Error>(labels)
    };

    // Evaluation passes are identical.
    let eval = dataset.input_pipeline(20, false, 1, None)?;
    assert_eq!(pass(&eval)?, (0..20).collect::<Vec<i64>>());
    assert_eq!(pass(&eval)?, (0..20).collect::<Vec<i64>>());

    // Training passes cover the same examples in a new order.
    let train = dataset.input_pipeline(20, true, 1, None)?;
    let first = pass(&train)?;
    let second = pass(&train)?;
    assert_ne!(first, second);

    let mut sorted = first;
    sorted.sort_unstable();
    let mut sorted_second = second;
    sorted_second.sort_unstable();
    assert_eq!(sorted, sorted_second);
    assert_eq!(sorted, (0..20).collect::<Vec<i64>>());
    Ok(())
}

// ============================================================================
// File errors
// ============================================================================

#[test]
fn test_corrupted_shard_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let paths = write_split(dir.path(), false, &[(0, vec![1, 2])])?;

    let mut bytes = std::fs::read(&paths[0])?;
    bytes[HEADER_LEN + 20] ^= 0xff;
    std::fs::write(&paths[0], bytes)?;

    let dataset = seeded(dir.path(), 1)?;
    let err = dataset.make_batch(2, false, 1, None).unwrap_err();
    match err.downcast_ref::<InputError>() {
        Some(InputError::Corrupted { origin, offset, .. }) => {
            assert!(origin.ends_with("validation-00000-of-00128"));
            assert_eq!(*offset, 0);
        }
        other => panic!("expected Corrupted, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_missing_shard_names_the_file() -> Result<()> {
    let dir = tempdir()?;
    let dataset = seeded(dir.path(), 1)?;

    let err = dataset.make_batch(1, false, 1, None).unwrap_err();
    assert!(format!("{:#}", err).contains("validation-00000-of-00128"));
    Ok(())
}
