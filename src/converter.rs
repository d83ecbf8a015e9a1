//! Two-phase converter setup: probe first, then build the orchestrator.

use std::sync::Arc;

use wf_codec::{load_source, run_blocking, ImageSource, Rasterizer, SvgRasterizer};
use wf_core::config::Config;
use wf_core::{
    Capabilities, ConversionReport, EncodeOptions, Error, ImageBuffer, Preferences, Result,
};
use wf_pipeline::{BackendRegistry, Collaborators, ConversionOrchestrator, EncodeContext};
use wf_probe::{CapabilityProbe, ProbeReport};

/// A ready-to-use conversion pipeline.
///
/// Holds no state that changes between conversions, so one instance can
/// serve concurrent requests.
pub struct Converter {
    config: Config,
    probe: ProbeReport,
    orchestrator: ConversionOrchestrator,
    rasterizer: Arc<dyn Rasterizer>,
}

impl Converter {
    /// Probe capabilities with the given collaborators and build the pipeline.
    pub async fn setup(config: Config, collaborators: Collaborators) -> Self {
        for warning in config.validate() {
            tracing::warn!("config: {warning}");
        }
        let gpu = Arc::clone(&collaborators.gpu);
        let codec = Arc::clone(&collaborators.codec);
        let report = CapabilityProbe::new(gpu, codec)
            .with_config(&config)
            .probe_full()
            .await;
        Self::from_probe(config, report, collaborators)
    }

    /// Build from an existing probe report.
    pub fn from_probe(config: Config, probe: ProbeReport, collaborators: Collaborators) -> Self {
        let registry = BackendRegistry::standard(collaborators, probe.device.clone(), &config);
        let orchestrator =
            ConversionOrchestrator::new(probe.capabilities, registry).with_config(&config);
        tracing::debug!(?orchestrator, "converter ready");
        Self {
            config,
            probe,
            orchestrator,
            rasterizer: Arc::new(SvgRasterizer::new()),
        }
    }

    /// Builder: replace the SVG rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.probe.capabilities
    }

    pub fn probe_report(&self) -> &ProbeReport {
        &self.probe
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &ConversionOrchestrator {
        &self.orchestrator
    }

    /// Convert with the configured default options and preferences.
    pub async fn convert(&self, image: ImageBuffer) -> Result<ConversionReport> {
        self.orchestrator
            .convert(image, &self.config.defaults, &self.config.preferences)
            .await
    }

    pub async fn convert_with(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        preferences: &Preferences,
        ctx: &EncodeContext,
    ) -> Result<ConversionReport> {
        self.orchestrator.convert_with(image, options, preferences, ctx).await
    }

    /// Load or rasterise `source` on a worker, then convert it.
    ///
    /// `scale` applies to SVG sources only. Sources that cannot be turned
    /// into pixels are reported as [`Error::InvalidInput`].
    pub async fn convert_source(
        &self,
        source: ImageSource,
        scale: f32,
        options: &EncodeOptions,
        preferences: &Preferences,
        ctx: &EncodeContext,
    ) -> Result<ConversionReport> {
        options.validate()?;
        let rasterizer = Arc::clone(&self.rasterizer);
        let (max_width, max_height) = (options.max_width, options.max_height);
        let image = run_blocking(&ctx.cancellation, move || {
            load_source(source, rasterizer.as_ref(), max_width, max_height, scale)
        })
        .await
        .map_err(|e| match e {
            Error::Raster(msg) => Error::InvalidInput(msg),
            other => other,
        })?;
        tracing::debug!(width = image.width(), height = image.height(), "source loaded");
        self.convert_with(image, options, preferences, ctx).await
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("capabilities", &self.probe.capabilities)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
