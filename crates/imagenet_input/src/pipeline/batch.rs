//! src/pipeline/batch.rs

use anyhow::{ensure, Result};

use super::{BoxIter, Dataset};

/// Dataset returned by [`DatasetExt::batch`](super::DatasetExt::batch).
///
/// The final group may be shorter than `batch_size`; it is dropped when
/// `drop_remainder` is set.
pub struct Batch<D> {
    inner: D,
    batch_size: usize,
    drop_remainder: bool,
}

impl<D> Batch<D> {
    pub(crate) fn new(inner: D, batch_size: usize, drop_remainder: bool) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be greater than 0");
        Ok(Self {
            inner,
            batch_size,
            drop_remainder,
        })
    }
}

impl<D: Dataset> Dataset for Batch<D> {
    type Item = Vec<D::Item>;

    fn iter(&self) -> Result<BoxIter<Vec<D::Item>>> {
        Ok(Box::new(BatchIter {
            upstream: self.inner.iter()?,
            pending: Vec::with_capacity(self.batch_size),
            batch_size: self.batch_size,
            drop_remainder: self.drop_remainder,
            done: false,
        }))
    }
}

struct BatchIter<T> {
    upstream: BoxIter<T>,
    pending: Vec<T>,
    batch_size: usize,
    drop_remainder: bool,
    done: bool,
}

impl<T> Iterator for BatchIter<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pending.len() < self.batch_size {
            match self.upstream.next() {
                Some(Ok(item)) => self.pending.push(item),
                Some(Err(e)) => return Some(Err(e)),
                None => self.done = true,
            }
        }

        let short = self.pending.len() < self.batch_size;
        if self.pending.is_empty() || (self.done && self.drop_remainder && short) {
            return None;
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        Some(Ok(batch))
    }
}
