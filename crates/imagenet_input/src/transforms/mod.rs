//! src/transforms/mod.rs

pub mod core;
pub mod vision;

pub use core::{Chain, Transform};
