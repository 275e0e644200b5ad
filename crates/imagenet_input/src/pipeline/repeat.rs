//! src/pipeline/repeat.rs

use anyhow::Result;
use std::sync::Arc;

use super::{BoxIter, Dataset};

/// Dataset returned by [`DatasetExt::repeat`](super::DatasetExt::repeat).
///
/// Starts a new upstream pass each time the previous one ends, `count` times
/// or without bound. A pass that yields nothing ends the stream, so repeating
/// an empty dataset forever terminates.
pub struct Repeat<D> {
    inner: Arc<D>,
    count: Option<usize>,
}

impl<D> Repeat<D> {
    pub(crate) fn new(inner: D, count: Option<usize>) -> Self {
        Self {
            inner: Arc::new(inner),
            count,
        }
    }
}

impl<D: Dataset> Dataset for Repeat<D> {
    type Item = D::Item;

    fn iter(&self) -> Result<BoxIter<D::Item>> {
        Ok(Box::new(RepeatIter {
            dataset: self.inner.clone(),
            current: None,
            remaining: self.count,
            yielded_this_pass: false,
        }))
    }
}

struct RepeatIter<D: Dataset> {
    dataset: Arc<D>,
    current: Option<BoxIter<D::Item>>,
    /// Passes not yet started; `None` is unbounded.
    remaining: Option<usize>,
    yielded_this_pass: bool,
}

impl<D: Dataset> Iterator for RepeatIter<D> {
    type Item = Result<D::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                match self.remaining {
                    Some(0) => return None,
                    Some(ref mut n) => *n -= 1,
                    None => {}
                }
                match self.dataset.iter() {
                    Ok(iter) => {
                        self.current = Some(iter);
                        self.yielded_this_pass = false;
                    }
                    Err(e) => {
                        self.remaining = Some(0);
                        return Some(Err(e));
                    }
                }
            }

            let current = self.current.as_mut()?;
            match current.next() {
                Some(item) => {
                    self.yielded_this_pass = true;
                    return Some(item);
                }
                None => {
                    self.current = None;
                    if !self.yielded_this_pass {
                        self.remaining = Some(0);
                        return None;
                    }
                }
            }
        }
    }
}
