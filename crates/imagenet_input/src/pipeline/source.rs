//! src/pipeline/source.rs

use anyhow::Result;
use std::sync::Arc;

use super::{BoxIter, Dataset};

/// A dataset over elements held in memory.
///
/// Elements are stored in an `Arc<[T]>`: cloning the dataset only bumps the
/// reference count and every pass clones elements out one at a time.
#[derive(Debug)]
pub struct InMemoryDataset<T> {
    items: Arc<[T]>,
}

impl<T> Clone for InMemoryDataset<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> InMemoryDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Dataset for InMemoryDataset<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn iter(&self) -> Result<BoxIter<T>> {
        let items = self.items.clone();
        Ok(Box::new((0..items.len()).map(move |i| Ok(items[i].clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterates_in_order_every_pass() -> Result<()> {
        let dataset = InMemoryDataset::new(vec![3, 1, 4, 1, 5]);
        assert_eq!(dataset.len(), 5);
        assert!(!dataset.is_empty());

        for _ in 0..2 {
            let items: Vec<i32> = dataset.iter()?.collect::<Result<_>>()?;
            assert_eq!(items, vec![3, 1, 4, 1, 5]);
        }
        Ok(())
    }

    #[test]
    fn test_empty() -> Result<()> {
        let dataset = InMemoryDataset::<u8>::new(Vec::new());
        assert!(dataset.is_empty());
        assert!(dataset.iter()?.next().is_none());
        Ok(())
    }

    #[test]
    fn test_concurrent_iter() {
        let dataset = Arc::new(InMemoryDataset::new((0..100usize).collect::<Vec<_>>()));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let dataset = dataset.clone();
                std::thread::spawn(move || {
                    dataset
                        .iter()
                        .unwrap()
                        .map(|r| r.unwrap())
                        .sum::<usize>()
                })
            })
            .collect();

        for t in threads {
            assert_eq!(t.join().unwrap(), 4950);
        }
    }
}
