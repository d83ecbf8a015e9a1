//! The always-available backstop encoder.

use std::time::Instant;

use async_trait::async_trait;
use wf_codec::{lossless, ops, run_blocking};
use wf_core::{BackendKind, EncodeOptions, EncodedResult, ImageBuffer, Result};

use crate::backend::EncoderBackend;
use crate::backends::common::{check_budget, elapsed_ms};
use crate::context::EncodeContext;

/// Pure-Rust encode with no optional capability.
///
/// Needs no GPU or native codec. [`BaselineBackend::encode_sync`] runs on the
/// calling thread; the async path hands the same work to the blocking pool so
/// cancellation and timeouts can interrupt the wait. For a well-formed image
/// and options it always produces bytes; anything else is a typed error.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineBackend;

impl BaselineBackend {
    pub fn new() -> Self {
        Self
    }

    /// Encode without an async context.
    pub fn encode_sync(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
    ) -> Result<EncodedResult> {
        image.validate()?;
        options.validate()?;
        let started = Instant::now();
        let original_size = image.byte_len();

        let (image, resized) = ops::fit_within(image, options.max_width, options.max_height)?;
        let (bytes, quality) =
            lossless::encode_with_quality(image, options.quality, options.lossless)?;

        let mut tags = Vec::new();
        if resized {
            tags.push("downscaled");
        }
        if options.lossless {
            tags.push("lossless");
        }
        Ok(
            EncodedResult::new("baseline", bytes, original_size, quality, elapsed_ms(started))?
                .with_optimizations(tags),
        )
    }
}

#[async_trait]
impl EncoderBackend for BaselineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Baseline
    }

    async fn encode(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
    ) -> Result<EncodedResult> {
        ctx.check_cancelled()?;
        let started = Instant::now();
        let opts = options.clone();
        let backend = *self;
        let result =
            run_blocking(&ctx.cancellation, move || backend.encode_sync(image, &opts)).await?;
        check_budget(self.kind(), started, options)?;
        Ok(result)
    }
}
