//! Built-in encoder backends.
//!
//! Each backend wraps one encoding strategy behind the unified
//! [`EncoderBackend`](crate::backend::EncoderBackend) trait. Pixel work is
//! delegated to the collaborators in `wf_codec`.

mod baseline;
mod common;
mod cpu;
mod gpu;
mod native;
mod progressive;

pub use baseline::BaselineBackend;
pub use cpu::CpuStandardBackend;
pub use gpu::GpuBackend;
pub use native::NativeCodecBackend;
pub use progressive::CpuProgressiveBackend;
