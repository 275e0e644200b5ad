//! src/pipeline/flat_map.rs

use anyhow::Result;
use std::sync::Arc;

use super::{BoxIter, Dataset};

/// Dataset returned by [`DatasetExt::flat_map`](super::DatasetExt::flat_map).
pub struct FlatMap<D, F> {
    inner: D,
    f: Arc<F>,
}

impl<D, F> FlatMap<D, F> {
    pub(crate) fn new(inner: D, f: F) -> Self {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

impl<D, F, U> Dataset for FlatMap<D, F>
where
    D: Dataset,
    F: Fn(D::Item) -> Result<BoxIter<U>> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn iter(&self) -> Result<BoxIter<U>> {
        Ok(Box::new(FlatMapIter {
            outer: self.inner.iter()?,
            current: None,
            f: self.f.clone(),
        }))
    }
}

struct FlatMapIter<T, U, F> {
    outer: BoxIter<T>,
    current: Option<BoxIter<U>>,
    f: Arc<F>,
}

impl<T, U, F> Iterator for FlatMapIter<T, U, F>
where
    F: Fn(T) -> Result<BoxIter<U>>,
{
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }

            match self.outer.next()? {
                Ok(element) => match (self.f)(element) {
                    Ok(inner) => self.current = Some(inner),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
