//! Quality-ladder CPU encoder.

use std::time::Instant;

use async_trait::async_trait;
use wf_codec::{lossless, run_blocking};
use wf_core::config::ProgressiveConfig;
use wf_core::events::ConversionEvent;
use wf_core::{BackendKind, EncodeOptions, EncodedResult, ImageBuffer, Result};

use crate::backend::EncoderBackend;
use crate::backends::common::{check_budget, elapsed_ms, prepare, quality_tags, target_quality};
use crate::context::EncodeContext;

/// Encodes a ladder of increasing qualities, one worker task per stage.
///
/// Every stage is published as a [`ConversionEvent::ProgressiveStage`]; only
/// the last stage is returned. Cancellation and the time budget are checked
/// between stages.
#[derive(Debug, Clone, Default)]
pub struct CpuProgressiveBackend {
    ladder: ProgressiveConfig,
}

impl CpuProgressiveBackend {
    pub fn new(ladder: ProgressiveConfig) -> Self {
        Self { ladder }
    }
}

#[async_trait]
impl EncoderBackend for CpuProgressiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CpuProgressive
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

        let (image, quality, mut tags) = run_blocking(&ctx.cancellation, move || {
            let prepared = prepare(image, &opts)?;
            let (quality, kind) = target_quality(&prepared.image, &opts);
            let mut tags = prepared.tags;
            tags.extend(quality_tags(kind));
            Ok((prepared.image, quality, tags))
        })
        .await?;

        let stages = if options.lossless {
            vec![1.0]
        } else {
            self.ladder.stages_for(quality)
        };
        let count = stages.len();
        let mut source = Some(image);
        let mut last = None;

        for (stage, q) in stages.into_iter().enumerate() {
            ctx.check_cancelled()?;
            check_budget(self.kind(), started, options)?;

            let is_final = stage + 1 == count;
            let input = if is_final { source.take() } else { source.clone() };
            let Some(input) = input else {
                break;
            };
            let lossless_stage = options.lossless;
            let (bytes, actual) = run_blocking(&ctx.cancellation, move || {
                lossless::encode_with_quality(input, q, lossless_stage)
            })
            .await?;

            tracing::debug!(
                stage,
                stages = count,
                quality = q,
                bytes = bytes.len(),
                "progressive stage encoded"
            );
            ctx.emit(ConversionEvent::ProgressiveStage {
                backend: self.kind(),
                stage,
                stages: count,
                quality: actual,
                bytes: bytes.len(),
            });
            last = Some((bytes, actual));
        }

        let Some((bytes, actual)) = last else {
            return Err(wf_core::Error::Internal("progressive ladder produced no stages".into()));
        };
        tags.push("progressive".to_string());
        Ok(EncodedResult::new("cpu-progressive", bytes, original_size, actual, elapsed_ms(started))?
            .with_optimizations(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use wf_core::events::EventSender;
    use wf_core::Error;

    fn recording_ctx() -> (EncodeContext, Arc<Mutex<Vec<ConversionEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = EncodeContext::new()
            .with_events(EventSender::new(move |e| sink.lock().push(e.clone())));
        (ctx, seen)
    }

    fn gradient() -> ImageBuffer {
        let mut px = Vec::new();
        for y in 0..48u32 {
            for x in 0..48u32 {
                px.extend_from_slice(&[(x * 5) as u8, (y * 5) as u8, 128, 255]);
            }
        }
        ImageBuffer::new(48, 48, px).unwrap()
    }

    #[tokio::test]
    async fn emits_every_stage_and_returns_last() {
        let (ctx, seen) = recording_ctx();
        let opts = EncodeOptions {
            adaptive_quality: false,
            quality: 0.9,
            ..EncodeOptions::default()
        };
        let out = CpuProgressiveBackend::default().encode(gradient(), &opts, &ctx).await.unwrap();

        let events = seen.lock();
        let stages: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ConversionEvent::ProgressiveStage { stage, stages, quality, bytes, .. } => {
                    Some((*stage, *stages, *quality, *bytes))
                }
                _ => None,
            })
            .collect();
        assert_eq!(stages.len(), 3);
        assert!(stages.iter().all(|s| s.1 == 3));
        assert_eq!(stages[0].2, 0.3);
        assert_eq!(stages[1].2, 0.6);
        let final_stage = stages[2];
        assert!((final_stage.2 - 0.9).abs() < 1e-6);
        assert_eq!(final_stage.3, out.compressed_size);
        assert!((out.actual_quality - 0.9).abs() < 1e-6);
        assert!(out.optimizations.iter().any(|t| t == "progressive"));
    }

    #[tokio::test]
    async fn low_target_skips_higher_previews() {
        let (ctx, seen) = recording_ctx();
        let opts = EncodeOptions {
            adaptive_quality: false,
            quality: 0.2,
            ..EncodeOptions::default()
        };
        CpuProgressiveBackend::default().encode(gradient(), &opts, &ctx).await.unwrap();
        let count = seen
            .lock()
            .iter()
            .filter(|e| matches!(e, ConversionEvent::ProgressiveStage { .. }))
            .count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn lossless_is_single_stage() {
        let (ctx, seen) = recording_ctx();
        let opts = EncodeOptions {
            lossless: true,
            ..EncodeOptions::default()
        };
        let out = CpuProgressiveBackend::default().encode(gradient(), &opts, &ctx).await.unwrap();
        assert_eq!(out.actual_quality, 1.0);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_ladder() {
        let ctx = EncodeContext::new();
        ctx.cancellation.cancel();
        let err = CpuProgressiveBackend::default()
            .encode(gradient(), &EncodeOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
