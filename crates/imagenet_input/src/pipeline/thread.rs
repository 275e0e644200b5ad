//! src/pipeline/thread.rs
//!
//! Thread-local worker identity and randomness.
//!
//! Pipeline workers record their index in `WORKER_ID` and own a seeded
//! `WORKER_RNG`, so random augmentations drawn inside a worker are
//! reproducible for a fixed base seed. Outside a worker (e.g. calling a
//! transform directly) the helpers fall back to the thread RNG.

use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    /// Index of the current pipeline worker (0 to num_workers-1).
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Seeded RNG for the current worker; `None` outside worker context.
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Seeds the calling thread's RNG.
/// Seed formula: base_seed + (iteration << 32) + worker_id
pub fn init_worker_rng(worker_id: usize, iteration: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| {
        let seed = base_seed
            .wrapping_add((iteration as u64) << 32)
            .wrapping_add(worker_id as u64);
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(seed));
    })
}

/// Clears the calling thread's seeded RNG.
pub fn reset_worker_rng() {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = None)
}

/// Draws a bool that is `true` with probability `p`.
pub fn worker_gen_bool(p: f64) -> bool {
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_bool(p),
        None => rand::rng().random_bool(p),
    })
}

/// Draws a value uniformly from `range`.
pub fn worker_gen_range<T, R>(range: R) -> T
where
    T: SampleUniform,
    R: SampleRange<T>,
{
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_range(range),
        None => rand::rng().random_range(range),
    })
}
