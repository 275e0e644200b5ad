//! src/transforms/core.rs

use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A single preprocessing step converting an input of type `I` into an
/// output of type `O`.
///
/// Steps compose with `.then(...)` into one statically dispatched chain:
/// ```ignore
/// let eval = AspectPreservingResize::new(256)?
///     .then(CenterCrop::new(224, 224)?)
///     .then(ToTensor)
///     .then(MeanSubtraction::vgg());
/// let tensor = eval.apply(image)?;
/// ```
///
/// `then()` requires the output of `self` to be the input of `next`, both
/// sides to be concrete (`Sized`) and intermediate values to be `Send`, since
/// chains run inside pipeline worker threads.
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// Two transforms run back to back (`A` -> `B`).
/// `PhantomData<M>` pins the intermediate type.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        let mid = self
            .first
            .apply(input)
            .with_context(|| format!("{} failed", short_type_name::<A>()))?;
        self.second
            .apply(mid)
            .with_context(|| format!("{} failed", short_type_name::<B>()))
    }
}

/// `imagenet_input::transforms::vision::geometric::CenterCrop` -> `CenterCrop`
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, ensure};

    struct Double;
    impl Transform<Vec<u8>, Vec<u8>> for Double {
        fn apply(&self, input: Vec<u8>) -> Result<Vec<u8>> {
            Ok(input.into_iter().map(|p| p.saturating_mul(2)).collect())
        }
    }

    struct Mean;
    impl Transform<Vec<u8>, f32> for Mean {
        fn apply(&self, input: Vec<u8>) -> Result<f32> {
            ensure!(!input.is_empty(), "no pixels");
            Ok(input.iter().map(|&p| p as f32).sum::<f32>() / input.len() as f32)
        }
    }

    struct Reject;
    impl Transform<Vec<u8>, Vec<u8>> for Reject {
        fn apply(&self, _: Vec<u8>) -> Result<Vec<u8>> {
            Err(anyhow!("corrupt pixels"))
        }
    }

    #[test]
    fn test_then_runs_steps_in_order() -> Result<()> {
        let pipeline = Double.then(Double).then(Mean);
        assert_eq!(pipeline.apply(vec![1, 2, 3])?, 8.0);
        Ok(())
    }

    #[test]
    fn test_chain_new_matches_then() -> Result<()> {
        let chain = Chain::new(Double, Mean);
        assert_eq!(chain.apply(vec![10, 20])?, 30.0);
        Ok(())
    }

    #[test]
    fn test_failing_step_is_named_in_context() {
        let chain = Chain::new(Reject, Mean);
        let err = chain.apply(vec![1]).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Reject failed"), "{}", msg);
        assert!(msg.contains("corrupt pixels"), "{}", msg);

        let err = Chain::new(Double, Mean).apply(vec![]).unwrap_err();
        assert!(format!("{:#}", err).contains("Mean failed"));
    }
}
