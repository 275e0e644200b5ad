//! src/pipeline/mod.rs
//!
//! Lazy, composable element pipelines.
//!
//! A [`Dataset`] is a recipe for a stream: every call to [`Dataset::iter`]
//! starts a fresh, finite, single pass. Combinators from [`DatasetExt`] wrap a
//! dataset in another dataset, so a whole input pipeline is a value that can
//! be iterated any number of times:
//!
//! ```ignore
//! let batches = InMemoryDataset::new(paths)
//!     .shuffle(1024, seed)?
//!     .flat_map(|path| open_records(path))
//!     .parallel_map(parse, 16, seed)?
//!     .prefetch(256)
//!     .repeat(Some(2))
//!     .batch(64, false)?;
//!
//! for batch in batches.iter()? {
//!     let batch: Vec<_> = batch?;
//! }
//! ```
//!
//! Errors raised anywhere upstream are forwarded as `Err` items at the stream
//! position where they occurred; the pipeline never skips bad elements.

mod batch;
mod flat_map;
mod map;
mod pool;
mod prefetch;
mod repeat;
mod shuffle;
mod source;
pub mod thread;

pub use batch::Batch;
pub use flat_map::FlatMap;
pub use map::{Map, ParallelMap};
pub use prefetch::Prefetch;
pub use repeat::Repeat;
pub use shuffle::Shuffle;
pub use source::InMemoryDataset;

use anyhow::Result;
use std::sync::Arc;

/// Boxed, owned element stream produced by [`Dataset::iter`].
pub type BoxIter<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// A re-iterable source of elements.
///
/// Implementations must be `Send + Sync` so a dataset can be shared with the
/// background threads that combinators such as `prefetch` spawn.
pub trait Dataset: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Starts a new pass over the elements.
    fn iter(&self) -> Result<BoxIter<Self::Item>>;
}

/// Combinators available on every [`Dataset`].
pub trait DatasetExt: Dataset + Sized {
    /// Replaces each element with the stream `f` returns for it; inner
    /// streams are drained one after another.
    fn flat_map<U, F>(self, f: F) -> FlatMap<Self, F>
    where
        F: Fn(Self::Item) -> Result<BoxIter<U>> + Send + Sync + 'static,
        U: Send + 'static,
    {
        FlatMap::new(self, f)
    }

    /// Applies `f` to each element on the consuming thread.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Item) -> Result<U> + Send + Sync + 'static,
        U: Send + 'static,
    {
        Map::new(self, f)
    }

    /// Applies `f` on `num_parallel_calls` worker threads, keeping input order.
    ///
    /// Each worker seeds its thread-local RNG from `seed`, the pass number and
    /// its worker index, so random work inside `f` is reproducible.
    fn parallel_map<U, F>(
        self,
        f: F,
        num_parallel_calls: usize,
        seed: u64,
    ) -> Result<ParallelMap<Self, F>>
    where
        F: Fn(Self::Item) -> Result<U> + Send + Sync + 'static,
        U: Send + 'static,
    {
        ParallelMap::new(self, f, num_parallel_calls, seed)
    }

    /// Produces up to `buffer_size` elements ahead on a background thread.
    fn prefetch(self, buffer_size: usize) -> Prefetch<Self> {
        Prefetch::new(self, buffer_size)
    }

    /// Randomizes element order through a buffer of `buffer_size` elements.
    fn shuffle(self, buffer_size: usize, seed: u64) -> Result<Shuffle<Self>> {
        Shuffle::new(self, buffer_size, seed)
    }

    /// Replays the dataset `count` times, or forever when `count` is `None`.
    fn repeat(self, count: Option<usize>) -> Repeat<Self> {
        Repeat::new(self, count)
    }

    /// Groups consecutive elements into vectors of `batch_size`.
    fn batch(self, batch_size: usize, drop_remainder: bool) -> Result<Batch<Self>> {
        Batch::new(self, batch_size, drop_remainder)
    }

    /// Erases the concrete combinator type.
    fn boxed(self) -> BoxedDataset<Self::Item> {
        BoxedDataset::new(self)
    }
}

impl<D: Dataset> DatasetExt for D {}

/// Type-erased, cheaply cloneable dataset.
pub struct BoxedDataset<T: Send + 'static> {
    inner: Arc<dyn Dataset<Item = T>>,
}

impl<T: Send + 'static> BoxedDataset<T> {
    pub fn new<D>(dataset: D) -> Self
    where
        D: Dataset<Item = T>,
    {
        Self {
            inner: Arc::new(dataset),
        }
    }
}

impl<T: Send + 'static> Clone for BoxedDataset<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Dataset for BoxedDataset<T> {
    type Item = T;

    fn iter(&self) -> Result<BoxIter<T>> {
        self.inner.iter()
    }
}
