//! # wf-pipeline
//!
//! Strategy selection, encoder backends, and the fallback orchestrator.
//!
//! This crate provides:
//!
//! - **[`EncoderBackend`]** trait -- one encoding strategy with a uniform
//!   async `encode` contract.
//! - **Built-in backends** ([`backends`]) -- GPU (standard, progressive,
//!   hybrid), native codec (optimized, lossless), CPU standard, CPU
//!   progressive, and the always-available baseline.
//! - **[`StrategySelector`]** -- a fixed-priority rule table turning
//!   capabilities, input size, and preferences into a [`ConversionPlan`].
//! - **[`ConversionOrchestrator`]** -- runs plan entries one at a time until
//!   one succeeds, enforcing the time budget and cancellation.
//! - **[`BackendRegistry`]** -- maps backend kinds to implementations.
//! - **[`analysis`]** -- subsampled image-type classification used to tune
//!   codec presets and adaptive quality.
//!
//! [`ConversionPlan`]: wf_core::ConversionPlan

pub mod analysis;
pub mod backend;
pub mod backends;
pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod selector;

// Re-export key types at the crate root.
pub use analysis::{analyze, ImageAnalysis, ImageKind};
pub use backend::EncoderBackend;
pub use context::EncodeContext;
pub use orchestrator::ConversionOrchestrator;
pub use registry::{BackendRegistry, Collaborators};
pub use selector::{Rule, SelectionInput, StrategySelector, RULES};
