//! GPU-assisted backends: standard, progressive, and the GPU + native codec
//! hybrid.
//!
//! Pixel work (resize, sharpen, quantize) runs on the GPU collaborator; byte
//! encoding runs on a worker. The device is shared with other conversions,
//! so its status is re-checked before every operation and any loss or
//! memory pressure surfaces as [`Error::BackendUnavailable`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use wf_codec::{
    lossless, ops, run_blocking, Device, DeviceStatus, GpuCompute, ImageOp, NativeCodec,
};
use wf_core::config::ProgressiveConfig;
use wf_core::events::ConversionEvent;
use wf_core::{BackendKind, EncodeOptions, EncodedResult, Error, ImageBuffer, Result};

use crate::analysis::{self, codec_preset};
use crate::backend::EncoderBackend;
use crate::backends::common::{
    check_budget, elapsed_ms, quality_tags, SHARPEN_SIGMA, SHARPEN_THRESHOLD,
};
use crate::context::EncodeContext;

/// Upload, scratch, and readback copies of the fitted image live on the
/// device at once.
const WORKING_SET_FACTOR: u64 = 3;

/// GPU backend for one of the three GPU strategies.
pub struct GpuBackend {
    kind: BackendKind,
    gpu: Arc<dyn GpuCompute>,
    device: Option<Device>,
    codec: Option<Arc<dyn NativeCodec>>,
    ladder: ProgressiveConfig,
}

impl GpuBackend {
    /// `GpuStandard`: GPU preprocessing, single encode.
    pub fn standard(gpu: Arc<dyn GpuCompute>, device: Option<Device>) -> Self {
        Self {
            kind: BackendKind::GpuStandard,
            gpu,
            device,
            codec: None,
            ladder: ProgressiveConfig::default(),
        }
    }

    /// `GpuProgressive`: GPU quantisation per ladder stage.
    pub fn progressive(
        gpu: Arc<dyn GpuCompute>,
        device: Option<Device>,
        ladder: ProgressiveConfig,
    ) -> Self {
        Self {
            kind: BackendKind::GpuProgressive,
            gpu,
            device,
            codec: None,
            ladder,
        }
    }

    /// `GpuWasmHybrid`: GPU preprocessing, native codec encode.
    pub fn hybrid(
        gpu: Arc<dyn GpuCompute>,
        device: Option<Device>,
        codec: Arc<dyn NativeCodec>,
    ) -> Self {
        Self {
            kind: BackendKind::GpuWasmHybrid,
            gpu,
            device,
            codec: Some(codec),
            ladder: ProgressiveConfig::default(),
        }
    }

    fn device(&self) -> Result<&Device> {
        self.device
            .as_ref()
            .ok_or_else(|| Error::unavailable(self.kind, "no GPU device was acquired"))
    }

    fn ensure_ready(&self, device: &Device) -> Result<()> {
        match self.gpu.device_status(device) {
            DeviceStatus::Ready => Ok(()),
            DeviceStatus::Lost => {
                Err(Error::unavailable(self.kind, format!("{} was lost", device.id)))
            }
            DeviceStatus::MemoryPressure => Err(Error::unavailable(
                self.kind,
                format!("{} is under memory pressure", device.id),
            )),
        }
    }

    fn fits(device: &Device, bytes: u64) -> bool {
        bytes <= device.memory_budget_bytes
    }

    /// Run one op, abandoning it if the conversion is cancelled.
    async fn run_op(
        &self,
        device: &Device,
        image: ImageBuffer,
        op: ImageOp,
        ctx: &EncodeContext,
    ) -> Result<ImageBuffer> {
        ctx.check_cancelled()?;
        self.ensure_ready(device)?;
        tracing::trace!(
            backend = %self.kind,
            device = %device.id,
            op = op.name(),
            "submitting GPU op"
        );
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(Error::Cancelled),
            out = self.gpu.run_image_op(device, image, op) => out,
        }
    }

    /// Fit to the option bounds, then check the fitted working set against
    /// the device budget.
    ///
    /// The resize runs on the device when source and target fit together;
    /// otherwise a worker shrinks the source first.
    async fn fit(
        &self,
        device: &Device,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
        tags: &mut Vec<String>,
    ) -> Result<ImageBuffer> {
        let (w, h) = ops::fit_dimensions(
            image.width(),
            image.height(),
            options.max_width,
            options.max_height,
        );
        let fitted_bytes = u64::from(w) * u64::from(h) * 4;
        let working_set = fitted_bytes * WORKING_SET_FACTOR;
        if !Self::fits(device, working_set) {
            return Err(Error::unavailable(
                self.kind,
                format!(
                    "working set of {working_set} bytes exceeds {} budget of {} bytes",
                    device.id, device.memory_budget_bytes
                ),
            ));
        }

        if (w, h) == (image.width(), image.height()) {
            return Ok(image);
        }
        tags.push("downscaled".to_string());
        if Self::fits(device, image.byte_len() as u64 + fitted_bytes) {
            let op = ImageOp::Resize {
                width: w,
                height: h,
            };
            return self.run_op(device, image, op, ctx).await;
        }
        tracing::debug!(
            backend = %self.kind,
            device = %device.id,
            "source too large for the device; downscaling on a worker"
        );
        run_blocking(&ctx.cancellation, move || ops::resize(image, w, h)).await
    }

    /// Fit and optionally sharpen on the device.
    async fn preprocess(
        &self,
        device: &Device,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
        tags: &mut Vec<String>,
    ) -> Result<ImageBuffer> {
        let mut image = self.fit(device, image, options, ctx, tags).await?;
        if options.enable_enhancement {
            let op = ImageOp::Sharpen {
                sigma: SHARPEN_SIGMA,
                threshold: SHARPEN_THRESHOLD,
            };
            image = self.run_op(device, image, op, ctx).await?;
            tags.push("enhanced".to_string());
        }
        Ok(image)
    }

    /// Quantize on the device, then encode on a worker.
    async fn quantize_and_encode(
        &self,
        device: &Device,
        image: ImageBuffer,
        quality: f32,
        lossless_mode: bool,
        ctx: &EncodeContext,
    ) -> Result<(Vec<u8>, f32)> {
        let (image, actual) = if lossless_mode {
            (image, 1.0)
        } else {
            let bits = ops::quantize_bits(quality);
            (self.run_op(device, image, ImageOp::Quantize { bits }, ctx).await?, quality)
        };
        let bytes =
            run_blocking(&ctx.cancellation, move || lossless::encode_lossless(&image)).await?;
        Ok((bytes, actual))
    }
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackend")
            .field("kind", &self.kind)
            .field("gpu", &self.gpu.name())
            .field("device", &self.device.as_ref().map(|d| d.id))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EncoderBackend for GpuBackend {
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
        let device = self.device()?;
        self.ensure_ready(device)?;

        let started = Instant::now();
        let original_size = image.byte_len();
        let mut tags = vec!["gpu-preprocess".to_string()];

        let image = self.preprocess(device, image, options, ctx, &mut tags).await?;
        let (quality, kind) = if options.adaptive_quality && !options.lossless {
            let kind = analysis::analyze(&image).kind;
            (analysis::adaptive_quality(options.quality, kind), Some(kind))
        } else {
            (options.quality, None)
        };
        tags.extend(quality_tags(kind));
        check_budget(self.kind, started, options)?;

        let (bytes, actual) = match self.kind {
            BackendKind::GpuWasmHybrid => {
                let codec = self
                    .codec
                    .clone()
                    .filter(|c| c.is_available())
                    .ok_or_else(|| Error::unavailable(self.kind, "native codec is not available"))?;
                let analysis = analysis::analyze(&image);
                let params = codec_preset(&analysis, options, quality);
                let bytes =
                    run_blocking(&ctx.cancellation, move || codec.encode_webp(&image, &params))
                        .await?;
                tags.push("native-codec".to_string());
                if params.use_sharp_yuv {
                    tags.push("sharp-yuv".to_string());
                }
                (bytes, if params.lossless { 1.0 } else { quality })
            }
            BackendKind::GpuProgressive => {
                let stages = if options.lossless {
                    vec![1.0]
                } else {
                    self.ladder.stages_for(quality)
                };
                let count = stages.len();
                let mut source = Some(image);
                let mut last = None;
                for (stage, q) in stages.into_iter().enumerate() {
                    check_budget(self.kind, started, options)?;
                    let input = if stage + 1 == count {
                        source.take()
                    } else {
                        source.clone()
                    };
                    let Some(input) = input else {
                        break;
                    };
                    let (bytes, actual) = self
                        .quantize_and_encode(device, input, q, options.lossless, ctx)
                        .await?;
                    ctx.emit(ConversionEvent::ProgressiveStage {
                        backend: self.kind,
                        stage,
                        stages: count,
                        quality: actual,
                        bytes: bytes.len(),
                    });
                    last = Some((bytes, actual));
                }
                tags.push("progressive".to_string());
                last.ok_or_else(|| Error::Internal("progressive ladder produced no stages".into()))?
            }
            _ => {
                self.quantize_and_encode(device, image, quality, options.lossless, ctx)
                    .await?
            }
        };
        if options.lossless {
            tags.push("lossless".to_string());
        }

        check_budget(self.kind, started, options)?;
        tracing::debug!(
            backend = %self.kind,
            device = %device.id,
            bytes = bytes.len(),
            "GPU encode finished"
        );
        Ok(
            EncodedResult::new("gpu", bytes, original_size, actual, elapsed_ms(started))?
                .with_optimizations(tags),
        )
    }
}
