//! Native-codec backends (optimized and lossless).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use wf_codec::{run_blocking, NativeCodec};
use wf_core::{BackendKind, EncodeOptions, EncodedResult, Error, ImageBuffer, Result};

use crate::analysis::{self, codec_preset};
use crate::backend::EncoderBackend;
use crate::backends::common::{check_budget, elapsed_ms, prepare};
use crate::context::EncodeContext;

/// Delegates to a [`NativeCodec`] with parameters picked from a subsampled
/// image-type analysis.
///
/// The lossless variant forces lossless encoding regardless of options.
pub struct NativeCodecBackend {
    kind: BackendKind,
    codec: Arc<dyn NativeCodec>,
}

impl NativeCodecBackend {
    /// The `WasmOptimized` strategy.
    pub fn optimized(codec: Arc<dyn NativeCodec>) -> Self {
        Self {
            kind: BackendKind::WasmOptimized,
            codec,
        }
    }

    /// The `WasmLossless` strategy.
    pub fn lossless(codec: Arc<dyn NativeCodec>) -> Self {
        Self {
            kind: BackendKind::WasmLossless,
            codec,
        }
    }
}

impl std::fmt::Debug for NativeCodecBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCodecBackend")
            .field("kind", &self.kind)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[async_trait]
impl EncoderBackend for NativeCodecBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn encode(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
    ) -> Result<EncodedResult> {
        ctx.check_cancelled()?;
        if !self.codec.is_available() {
            return Err(Error::unavailable(
                self.kind,
                format!("{} codec is not available", self.codec.name()),
            ));
        }

        let started = Instant::now();
        let original_size = image.byte_len();
        let mut opts = options.clone();
        opts.lossless |= self.kind == BackendKind::WasmLossless;
        let codec = Arc::clone(&self.codec);

        let (bytes, quality, tags) = run_blocking(&ctx.cancellation, move || {
            let prepared = prepare(image, &opts)?;
            let analysis = analysis::analyze(&prepared.image);
            let quality = if opts.lossless {
                1.0
            } else if opts.adaptive_quality {
                analysis::adaptive_quality(opts.quality, analysis.kind)
            } else {
                opts.quality
            };
            let params = codec_preset(&analysis, &opts, quality);
            tracing::debug!(
                codec = codec.name(),
                kind = %analysis.kind,
                method = params.method,
                passes = params.passes,
                lossless = params.lossless,
                "native codec preset"
            );
            let bytes = codec.encode_webp(&prepared.image, &params)?;

            let mut tags = prepared.tags;
            tags.push("native-codec".to_string());
            tags.push(format!("image-type:{}", analysis.kind));
            if opts.adaptive_quality && !opts.lossless {
                tags.push("adaptive-quality".to_string());
            }
            if params.use_sharp_yuv {
                tags.push("sharp-yuv".to_string());
            }
            if params.lossless {
                tags.push("lossless".to_string());
            }
            Ok((bytes, quality, tags))
        })
        .await?;

        check_budget(self.kind, started, options)?;
        let elapsed = elapsed_ms(started);
        Ok(
            EncodedResult::new(self.codec.name(), bytes, original_size, quality, elapsed)?
                .with_optimizations(tags),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use wf_codec::{CodecParams, UnavailableCodec};

    /// Records the parameters it was called with.
    #[derive(Default)]
    struct RecordingCodec {
        calls: Mutex<Vec<CodecParams>>,
    }

    impl NativeCodec for RecordingCodec {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn encode_webp(&self, image: &ImageBuffer, params: &CodecParams) -> Result<Vec<u8>> {
            self.calls.lock().push(*params);
            Ok(vec![7; image.byte_len() / 8])
        }
    }

    fn flat() -> ImageBuffer {
        ImageBuffer::filled(32, 32, [200, 10, 10, 255]).unwrap()
    }

    #[tokio::test]
    async fn unavailable_codec_is_backend_unavailable() {
        let backend = NativeCodecBackend::optimized(Arc::new(UnavailableCodec));
        let err = backend
            .encode(flat(), &EncodeOptions::default(), &EncodeContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn optimized_uses_line_art_preset() {
        let codec = Arc::new(RecordingCodec::default());
        let backend = NativeCodecBackend::optimized(codec.clone());
        let out = backend
            .encode(flat(), &EncodeOptions::default(), &EncodeContext::new())
            .await
            .unwrap();

        let params = codec.calls.lock()[0];
        assert_eq!((params.method, params.passes, params.use_sharp_yuv), (6, 2, false));
        assert!(!params.lossless);
        assert!((params.quality - 90.0).abs() < 1e-3);
        assert_eq!(out.compression_ratio, 8.0);
        assert!(out.optimizations.iter().any(|t| t == "image-type:line-art"));
    }

    #[tokio::test]
    async fn lossless_variant_forces_lossless() {
        let codec = Arc::new(RecordingCodec::default());
        let backend = NativeCodecBackend::lossless(codec.clone());
        let out = backend
            .encode(flat(), &EncodeOptions::default(), &EncodeContext::new())
            .await
            .unwrap();

        let params = codec.calls.lock()[0];
        assert!(params.lossless && params.exact);
        assert_eq!(out.actual_quality, 1.0);
        assert!(out.optimizations.iter().any(|t| t == "lossless"));
    }

    #[tokio::test]
    async fn libwebp_produces_webp() {
        let backend = NativeCodecBackend::optimized(Arc::new(wf_codec::LibWebpCodec::new()));
        let out = backend
            .encode(flat(), &EncodeOptions::default(), &EncodeContext::new())
            .await
            .unwrap();
        assert!(wf_codec::lossless::is_webp(&out.bytes));
    }
}
