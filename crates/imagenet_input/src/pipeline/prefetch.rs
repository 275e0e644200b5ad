//! src/pipeline/prefetch.rs

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{BoxIter, Dataset};
use crate::error::InputError;

/// Dataset returned by [`DatasetExt::prefetch`](super::DatasetExt::prefetch).
///
/// Each pass runs the upstream iterator on its own thread, staying at most
/// `buffer_size` elements ahead of the consumer. A `buffer_size` of zero
/// disables the background thread entirely.
pub struct Prefetch<D> {
    inner: D,
    buffer_size: usize,
}

impl<D> Prefetch<D> {
    pub(crate) fn new(inner: D, buffer_size: usize) -> Self {
        Self { inner, buffer_size }
    }
}

impl<D: Dataset> Dataset for Prefetch<D> {
    type Item = D::Item;

    fn iter(&self) -> Result<BoxIter<D::Item>> {
        let mut upstream = self.inner.iter()?;
        if self.buffer_size == 0 {
            return Ok(upstream);
        }

        let (tx, rx) = bounded(self.buffer_size);
        let stop = Arc::new(AtomicBool::new(false));
        let producer_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("prefetch".into())
            .spawn(move || {
                while !producer_stop.load(Ordering::Relaxed) {
                    match upstream.next() {
                        Some(item) => {
                            // Receiver dropped: the consumer is gone.
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            })
            .context("Failed to spawn prefetch thread")?;

        Ok(Box::new(PrefetchIter {
            rx: Some(rx),
            handle: Some(handle),
            stop,
        }))
    }
}

struct PrefetchIter<T> {
    rx: Option<Receiver<Result<T>>>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl<T> Iterator for PrefetchIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                // Producer finished (or died); surface a panic once.
                self.rx = None;
                let handle = self.handle.take()?;
                match handle.join() {
                    Ok(()) => None,
                    Err(_) => Some(Err(anyhow!(InputError::worker(
                        "prefetch thread panicked"
                    )))),
                }
            }
        }
    }
}

impl<T> Drop for PrefetchIter<T> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Unblocks a producer waiting on a full channel.
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
