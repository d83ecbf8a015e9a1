//! wf-core: shared types, errors, configuration, and conversion events.
//!
//! This crate is the foundational dependency for all other wf-* crates,
//! providing the raster buffer type, encode options and results, backend
//! identifiers, conversion reports, a unified error type, and the pipeline
//! configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod image;
pub mod report;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, FailureKind, Result};
pub use image::ImageBuffer;
pub use report::*;
pub use types::*;
