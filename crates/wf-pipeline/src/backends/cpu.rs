//! Off-thread CPU encode with adaptive quality.

use std::time::Instant;

use async_trait::async_trait;
use wf_codec::{lossless, run_blocking};
use wf_core::{BackendKind, EncodeOptions, EncodedResult, ImageBuffer, Result};

use crate::backend::EncoderBackend;
use crate::backends::common::{check_budget, elapsed_ms, prepare, quality_tags, target_quality};
use crate::context::EncodeContext;

/// Encodes on the blocking pool, nudging quality by image type when
/// `adaptive_quality` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuStandardBackend;

impl CpuStandardBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EncoderBackend for CpuStandardBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CpuStandard
    }

    async fn encode(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
    ) -> Result<EncodedResult> {
        ctx.check_cancelled()?;
        let started = Instant::now();
        let original_size = image.byte_len();
        let opts = options.clone();

        let (bytes, quality, tags) = run_blocking(&ctx.cancellation, move || {
            let prepared = prepare(image, &opts)?;
            let (quality, kind) = target_quality(&prepared.image, &opts);
            let (bytes, actual) =
                lossless::encode_with_quality(prepared.image, quality, opts.lossless)?;
            let mut tags = prepared.tags;
            tags.extend(quality_tags(kind));
            Ok((bytes, actual, tags))
        })
        .await?;

        check_budget(self.kind(), started, options)?;
        tracing::debug!(bytes = bytes.len(), quality, "cpu encode finished");
        Ok(
            EncodedResult::new("cpu", bytes, original_size, quality, elapsed_ms(started))?
                .with_optimizations(tags),
        )
    }
}
