//! # wf-probe
//!
//! Runtime capability detection for the encoding pipeline.
//!
//! [`CapabilityProbe`] asks the GPU and codec collaborators what they can do,
//! checks for off-thread workers, and times a small floating-point loop to
//! assign a coarse [`PerformanceClass`](wf_core::PerformanceClass). Probing
//! never fails: anything that errors or panics is reported as absent.
//!
//! ## Quick start
//!
//! ```no_run
//! use wf_probe::CapabilityProbe;
//!
//! # async fn example() {
//! let probe = CapabilityProbe::with_defaults();
//! let report = probe.probe_full().await;
//! println!("gpu: {}", report.capabilities.gpu_available);
//! # }
//! ```

pub mod benchmark;
pub mod probe;

pub use benchmark::{classify, run_benchmark};
pub use probe::{CapabilityProbe, ProbeReport};
