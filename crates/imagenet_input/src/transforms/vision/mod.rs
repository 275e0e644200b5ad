//! src/transforms/vision/mod.rs
//!
//! Vision transforms for image decoding, preprocessing and augmentation.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── io.rs            → Decoding encoded bytes
//! ├── geometric.rs     → Spatial transformations (resize, crop)
//! ├── augmentation.rs  → Random flips
//! ├── conversion.rs    → image → HWC tensor
//! └── photometric.rs   → Mean subtraction
//! ```
//!
//! Random transforms draw from the pipeline worker RNG
//! (`crate::pipeline::thread`), so they are reproducible inside a seeded
//! `parallel_map`.
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{AspectPreservingResize, CenterCrop, ToTensor, MeanSubtraction};
//!
//! let eval = AspectPreservingResize::new(256)?
//!     .then(CenterCrop::new(224, 224)?)
//!     .then(ToTensor)
//!     .then(MeanSubtraction::vgg());
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::ToTensor;
pub use geometric::{
    AspectPreservingResize, CenterCrop, EnsureRgb, RandomAspectPreservingResize, RandomCrop,
};
pub use io::DecodeImage;
pub use photometric::MeanSubtraction;
