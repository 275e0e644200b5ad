//! src/pipeline/shuffle.rs

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BoxIter, Dataset};

/// Dataset returned by [`DatasetExt::shuffle`](super::DatasetExt::shuffle).
///
/// Holds up to `buffer_size` elements and emits a uniformly chosen one each
/// step, refilling from upstream as it goes. A buffer at least as large as
/// the stream gives a full uniform permutation. Every pass draws a new
/// order: the RNG is seeded from `seed` mixed with the pass number.
pub struct Shuffle<D> {
    inner: D,
    buffer_size: usize,
    seed: u64,
    iteration: AtomicUsize,
}

impl<D> Shuffle<D> {
    pub(crate) fn new(inner: D, buffer_size: usize, seed: u64) -> Result<Self> {
        ensure!(buffer_size > 0, "shuffle buffer_size must be greater than 0");
        Ok(Self {
            inner,
            buffer_size,
            seed,
            iteration: AtomicUsize::new(0),
        })
    }
}

impl<D: Dataset> Dataset for Shuffle<D> {
    type Item = D::Item;

    fn iter(&self) -> Result<BoxIter<D::Item>> {
        let iteration = self.iteration.fetch_add(1, Ordering::SeqCst) as u64;
        let rng = StdRng::seed_from_u64(self.seed.wrapping_add(iteration << 32));
        Ok(Box::new(ShuffleIter {
            upstream: self.inner.iter()?,
            buffer: Vec::with_capacity(self.buffer_size.min(4096)),
            buffer_size: self.buffer_size,
            rng,
            upstream_done: false,
        }))
    }
}

struct ShuffleIter<T> {
    upstream: BoxIter<T>,
    buffer: Vec<T>,
    buffer_size: usize,
    rng: StdRng,
    upstream_done: bool,
}

impl<T> Iterator for ShuffleIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done && self.buffer.len() < self.buffer_size {
            match self.upstream.next() {
                Some(Ok(item)) => self.buffer.push(item),
                Some(Err(e)) => return Some(Err(e)),
                None => self.upstream_done = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.buffer.len());
        Some(Ok(self.buffer.swap_remove(index)))
    }
}
