//! # wf-codec
//!
//! Collaborator boundaries for the encoding pipeline.
//!
//! The pipeline never touches GPU kernels, codec internals, or SVG parsing
//! directly. It talks to narrow interfaces defined here:
//!
//! - **[`GpuCompute`]** -- device acquisition and image operations, with a
//!   rayon-backed [`SoftwareGpu`] adapter and an [`UnavailableGpu`] stand-in.
//! - **[`NativeCodec`]** -- full-featured WebP encoding, backed by libwebp in
//!   [`LibWebpCodec`].
//! - **[`Rasterizer`]** and [`ImageSource`] -- turning SVG or encoded images
//!   into an [`ImageBuffer`](wf_core::ImageBuffer).
//! - **[`run_blocking`]** -- off-thread execution with cancellation.
//! - **[`lossless`]** and **[`ops`]** -- the pure-Rust encoder and pixel
//!   operations shared by the CPU and baseline paths.

pub mod gpu;
pub mod lossless;
pub mod native;
pub mod ops;
pub mod source;
pub mod worker;

pub use gpu::{
    Device, DeviceId, DevicePreferences, DeviceStatus, GpuCompute, ImageOp, SoftwareGpu,
    UnavailableGpu,
};
pub use native::{CodecParams, LibWebpCodec, NativeCodec, UnavailableCodec};
pub use source::{load_source, ImageSource, Rasterizer, SvgRasterizer};
pub use worker::run_blocking;
