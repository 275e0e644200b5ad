//! src/pipeline/pool.rs
//!
//! Worker pool behind `parallel_map`.
//!
//! Each worker owns a private bounded task channel and all workers share one
//! output channel. The caller routes task `n` to worker `n % num_workers`, so
//! which worker handles which element (and therefore which RNG stream it
//! sees) depends only on the element's position in the stream.
//!
//! Dropping the pool sets the shutdown flag, closes every task channel and
//! joins the workers.

use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::thread::WORKER_ID;
use crate::error::InputError;

pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_txs: Vec<Sender<Task>>,
    output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads running `worker_fn`.
    ///
    /// `buffer_size` bounds each worker's task queue; the output queue holds
    /// `buffer_size * num_workers` results.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        ensure!(num_workers > 0, "Cannot create WorkerPool with 0 workers");
        ensure!(
            buffer_size > 0,
            "Cannot create WorkerPool with buffer_size 0. \
             Buffer size must be > 0 to prevent deadlocks."
        );

        let mut task_txs = Vec::with_capacity(num_workers);
        let mut task_rxs = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = bounded(buffer_size);
            task_txs.push(tx);
            task_rxs.push(rx);
        }
        let (output_tx, output_rx) = bounded(buffer_size * num_workers);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        for (worker_id, task_rx) in task_rxs.into_iter().enumerate() {
            let output_tx = output_tx.clone();
            let shutdown = shutdown.clone();
            let worker_fn = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("pipeline-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn(task_rx, output_tx, shutdown);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;
            workers.push(handle);
        }

        Ok(Self {
            workers,
            task_txs,
            output_rx,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.task_txs.len()
    }

    /// Routes `task` to worker `position % num_workers`.
    pub(crate) fn send(&self, position: usize, task: Task) -> Result<()> {
        let worker_id = position % self.task_txs.len();
        self.task_txs[worker_id].send(task).map_err(|_| {
            anyhow!(InputError::worker(format!(
                "worker {} stopped accepting tasks",
                worker_id
            )))
        })
    }

    /// Blocks until any worker delivers a result.
    pub(crate) fn recv(&self) -> Result<Output> {
        self.output_rx
            .recv()
            .map_err(|_| anyhow!(InputError::worker("all workers exited with tasks pending")))
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.task_txs.clear();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
