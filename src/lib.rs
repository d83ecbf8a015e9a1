//! webpforge: capability-driven WebP encoding.
//!
//! Probe the runtime once, then convert images through a ranked plan of
//! encoding strategies that falls back to a pure-Rust baseline.
//!
//! ```no_run
//! use webpforge::{Collaborators, Converter, ImageBuffer};
//! use webpforge::config::Config;
//!
//! # async fn demo() -> webpforge::Result<()> {
//! let converter = Converter::setup(Config::default(), Collaborators::default()).await;
//! let image = ImageBuffer::filled(640, 480, [255, 255, 255, 255])?;
//! let report = converter.convert(image).await?;
//! println!("{} bytes via {}", report.result.compressed_size, report.method);
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod logging;

pub use converter::Converter;
pub use tokio_util::sync::CancellationToken;
pub use wf_codec::{ImageSource, Rasterizer, SvgRasterizer};
pub use wf_core::events::{ConversionEvent, EventSender};
pub use wf_core::{
    config, Attempt, AttemptOutcome, BackendKind, Capabilities, ConversionPlan, ConversionReport,
    ConversionState, EncodeOptions, EncodedResult, Error, FailureKind, ImageBuffer,
    PerformanceClass, Preferences, Result,
};
pub use wf_pipeline::{
    BackendRegistry, Collaborators, ConversionOrchestrator, EncodeContext, EncoderBackend,
};
pub use wf_probe::{CapabilityProbe, ProbeReport};
