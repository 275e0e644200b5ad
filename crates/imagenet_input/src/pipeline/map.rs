//! src/pipeline/map.rs
//!
//! Element-wise mapping, inline (`Map`) or on a worker pool (`ParallelMap`).
//!
//! `ParallelMap` keeps at most `num_parallel_calls` elements in flight. The
//! element at stream position `n` always goes to worker `n % num_workers`,
//! and results pass through a reorder buffer so the output order equals the
//! input order regardless of which worker finishes first.

use anyhow::{ensure, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::pool::WorkerPool;
use super::thread::{init_worker_rng, WORKER_ID};
use super::{BoxIter, Dataset};
use crate::error::InputError;

/// Per-worker task queue depth.
const WORKER_QUEUE_DEPTH: usize = 2;
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Dataset returned by [`DatasetExt::map`](super::DatasetExt::map).
pub struct Map<D, F> {
    inner: D,
    f: Arc<F>,
}

impl<D, F> Map<D, F> {
    pub(crate) fn new(inner: D, f: F) -> Self {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

impl<D, F, U> Dataset for Map<D, F>
where
    D: Dataset,
    F: Fn(D::Item) -> Result<U> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn iter(&self) -> Result<BoxIter<U>> {
        let f = self.f.clone();
        Ok(Box::new(
            self.inner.iter()?.map(move |item| item.and_then(|x| f(x))),
        ))
    }
}

/// Dataset returned by [`DatasetExt::parallel_map`](super::DatasetExt::parallel_map).
pub struct ParallelMap<D, F> {
    inner: D,
    f: Arc<F>,
    num_parallel_calls: usize,
    seed: u64,
    iteration: AtomicUsize,
}

impl<D, F> ParallelMap<D, F> {
    pub(crate) fn new(inner: D, f: F, num_parallel_calls: usize, seed: u64) -> Result<Self> {
        ensure!(
            num_parallel_calls > 0,
            "num_parallel_calls must be greater than 0"
        );
        Ok(Self {
            inner,
            f: Arc::new(f),
            num_parallel_calls,
            seed,
            iteration: AtomicUsize::new(0),
        })
    }
}

impl<D, F, U> Dataset for ParallelMap<D, F>
where
    D: Dataset,
    F: Fn(D::Item) -> Result<U> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn iter(&self) -> Result<BoxIter<U>> {
        let upstream = self.inner.iter()?;
        let iteration = self.iteration.fetch_add(1, Ordering::SeqCst);
        let seed = self.seed;
        let f = self.f.clone();

        trace!(
            num_parallel_calls = self.num_parallel_calls,
            iteration,
            "Starting parallel map workers"
        );

        let pool = WorkerPool::new(
            self.num_parallel_calls,
            WORKER_QUEUE_DEPTH,
            move |task_rx: Receiver<(usize, D::Item)>,
                  output_tx: Sender<(usize, Result<U>)>,
                  shutdown: Arc<AtomicBool>| {
                let worker_id = WORKER_ID.with(|id| *id.borrow());
                init_worker_rng(worker_id, iteration, seed);

                while !shutdown.load(Ordering::Relaxed) {
                    match task_rx.recv_timeout(WORKER_POLL_INTERVAL) {
                        Ok((position, item)) => {
                            let result = catch_unwind(AssertUnwindSafe(|| f(item)))
                                .unwrap_or_else(|_| {
                                    Err(InputError::worker(format!(
                                        "worker {} panicked on element {}",
                                        worker_id, position
                                    ))
                                    .into())
                                });
                            if output_tx.send((position, result)).is_err() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            },
        )?;

        Ok(Box::new(ParallelMapIter {
            upstream,
            max_in_flight: pool.num_workers(),
            pool,
            reorder: BTreeMap::new(),
            in_flight: 0,
            next_position: 0,
            next_output: 0,
            upstream_done: false,
        }))
    }
}

struct ParallelMapIter<T, U> {
    upstream: BoxIter<T>,
    pool: WorkerPool<(usize, T), (usize, Result<U>)>,
    /// Results waiting for every earlier position to be emitted.
    reorder: BTreeMap<usize, Result<U>>,
    max_in_flight: usize,
    in_flight: usize,
    next_position: usize,
    next_output: usize,
    upstream_done: bool,
}

impl<T, U> ParallelMapIter<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Pulls from upstream until the window is full or upstream ends.
    fn fill(&mut self) -> Result<()> {
        while !self.upstream_done && self.next_position - self.next_output < self.max_in_flight {
            match self.upstream.next() {
                Some(Ok(item)) => {
                    self.pool.send(self.next_position, (self.next_position, item))?;
                    self.in_flight += 1;
                }
                // Upstream failures bypass the workers but keep their slot.
                Some(Err(e)) => {
                    self.reorder.insert(self.next_position, Err(e));
                }
                None => {
                    self.upstream_done = true;
                    break;
                }
            }
            self.next_position += 1;
        }
        Ok(())
    }
}

impl<T, U> Iterator for ParallelMapIter<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Err(e) = self.fill() {
                self.upstream_done = true;
                self.in_flight = 0;
                return Some(Err(e));
            }

            if let Some(result) = self.reorder.remove(&self.next_output) {
                self.next_output += 1;
                return Some(result);
            }

            if self.in_flight == 0 {
                return None;
            }

            match self.pool.recv() {
                Ok((position, result)) => {
                    self.in_flight -= 1;
                    self.reorder.insert(position, result);
                }
                Err(e) => {
                    self.upstream_done = true;
                    self.in_flight = 0;
                    return Some(Err(e));
                }
            }
        }
    }
}
