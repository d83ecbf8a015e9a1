//! The [`CapabilityProbe`] and its report.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::OnceCell;
use wf_codec::{Device, DevicePreferences, GpuCompute, LibWebpCodec, NativeCodec, UnavailableGpu};
use wf_core::config::{BenchmarkConfig, Config, ProbeConfig};
use wf_core::Capabilities;

use crate::benchmark::{classify, run_benchmark};

static CACHE: OnceCell<ProbeReport> = OnceCell::const_new();

/// Everything a probe learned.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub capabilities: Capabilities,
    /// The acquired device, present exactly when `gpu_available` is set.
    pub device: Option<Device>,
    pub benchmark_ms: Option<f64>,
}

/// Detects runtime capabilities.
///
/// Probing is idempotent and side-effect free apart from the benchmark's CPU
/// time and the device acquisition. Capabilities are assumed stable for the
/// session; [`CapabilityProbe::cached`] memoises the first result.
pub struct CapabilityProbe {
    gpu: Arc<dyn GpuCompute>,
    codec: Arc<dyn NativeCodec>,
    overrides: ProbeConfig,
    benchmark: BenchmarkConfig,
    device_prefs: DevicePreferences,
}

impl CapabilityProbe {
    /// Create a probe over the given collaborators.
    pub fn new(gpu: Arc<dyn GpuCompute>, codec: Arc<dyn NativeCodec>) -> Self {
        Self {
            gpu,
            codec,
            overrides: ProbeConfig::default(),
            benchmark: BenchmarkConfig::default(),
            device_prefs: DevicePreferences::default(),
        }
    }

    /// Probe with no GPU collaborator and the libwebp codec.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(UnavailableGpu), Arc::new(LibWebpCodec::new()))
    }

    /// Builder: apply capability overrides and benchmark settings from config.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.overrides = config.probe;
        self.benchmark = config.benchmark;
        self
    }

    /// Builder: set device acquisition preferences.
    pub fn with_device_preferences(mut self, prefs: DevicePreferences) -> Self {
        self.device_prefs = prefs;
        self
    }

    /// Detect capabilities.
    ///
    /// Any device acquired along the way is released before returning; use
    /// [`CapabilityProbe::probe_full`] to keep it.
    pub async fn probe(&self) -> Capabilities {
        let report = self.probe_full().await;
        if let Some(device) = &report.device {
            self.gpu.release_device(device);
        }
        report.capabilities
    }

    /// Detect capabilities, keeping the acquired device handle.
    pub async fn probe_full(&self) -> ProbeReport {
        let device = if self.overrides.disable_gpu {
            None
        } else {
            self.acquire_device().await
        };
        let gpu_available = device.is_some();

        let worker_available = !self.overrides.disable_workers && detect_workers();
        let progressive_supported = worker_available && !self.overrides.disable_progressive;

        let native_codec_available = !self.overrides.disable_native_codec && self.codec_available();

        let iterations = self.benchmark.iterations;
        let benchmark_ms = std::panic::catch_unwind(|| run_benchmark(iterations))
            .ok()
            .flatten();
        let performance_class =
            classify(benchmark_ms, gpu_available, worker_available, &self.benchmark);

        let capabilities = Capabilities {
            gpu_available,
            worker_available,
            progressive_supported,
            native_codec_available,
            performance_class,
        }
        .normalized();

        tracing::info!(
            gpu = capabilities.gpu_available,
            worker = capabilities.worker_available,
            progressive = capabilities.progressive_supported,
            native_codec = capabilities.native_codec_available,
            performance = %capabilities.performance_class,
            benchmark_ms = benchmark_ms.unwrap_or(-1.0),
            "capabilities probed"
        );

        ProbeReport {
            capabilities,
            device,
            benchmark_ms,
        }
    }

    /// Probe once per process and return the memoised report.
    ///
    /// The first caller's collaborators and configuration determine the
    /// result for the rest of the process.
    pub async fn cached(&self) -> &'static ProbeReport {
        CACHE.get_or_init(|| self.probe_full()).await
    }

    async fn acquire_device(&self) -> Option<Device> {
        let attempt = AssertUnwindSafe(self.gpu.try_acquire_device(&self.device_prefs))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Some(device)) => {
                tracing::debug!(
                    adapter = self.gpu.name(),
                    device = %device.id,
                    "GPU device acquired"
                );
                Some(device)
            }
            Ok(None) => {
                tracing::debug!(adapter = self.gpu.name(), "no GPU device available");
                None
            }
            Err(_) => {
                tracing::warn!(
                    adapter = self.gpu.name(),
                    "GPU acquisition panicked; treating as absent"
                );
                None
            }
        }
    }

    fn codec_available(&self) -> bool {
        let codec = &self.codec;
        match std::panic::catch_unwind(AssertUnwindSafe(|| codec.is_available())) {
            Ok(available) => available,
            Err(_) => {
                tracing::warn!(
                    codec = codec.name(),
                    "codec availability check panicked; treating as absent"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("gpu", &self.gpu.name())
            .field("codec", &self.codec.name())
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Off-thread work needs a tokio runtime to host the blocking pool and more
/// than one core to be worth it.
fn detect_workers() -> bool {
    tokio::runtime::Handle::try_current().is_ok() && num_cpus::get() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wf_codec::{DeviceStatus, ImageOp, SoftwareGpu, UnavailableCodec};
    use wf_core::{ImageBuffer, PerformanceClass, Result};

    struct PanickingGpu;

    #[async_trait]
    impl GpuCompute for PanickingGpu {
        fn name(&self) -> &'static str {
            "panicking"
        }
        async fn try_acquire_device(&self, _prefs: &DevicePreferences) -> Option<Device> {
            panic!("driver crashed")
        }
        fn device_status(&self, _device: &Device) -> DeviceStatus {
            DeviceStatus::Lost
        }
        async fn run_image_op(
            &self,
            _d: &Device,
            image: ImageBuffer,
            _op: ImageOp,
        ) -> Result<ImageBuffer> {
            Ok(image)
        }
    }

    struct PanickingCodec;

    impl NativeCodec for PanickingCodec {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn is_available(&self) -> bool {
            panic!("library missing")
        }
        fn encode_webp(
            &self,
            _image: &ImageBuffer,
            _params: &wf_codec::CodecParams,
        ) -> Result<Vec<u8>> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn software_gpu_is_detected() {
        let probe =
            CapabilityProbe::new(Arc::new(SoftwareGpu::default()), Arc::new(LibWebpCodec::new()));
        let report = probe.probe_full().await;
        assert!(report.capabilities.gpu_available);
        assert!(report.device.is_some());
        assert!(report.capabilities.native_codec_available);
    }

    #[tokio::test]
    async fn capabilities_only_call_releases_device() {
        let gpu = Arc::new(SoftwareGpu::default());
        let probe = CapabilityProbe::new(gpu.clone(), Arc::new(LibWebpCodec::new()));
        assert!(probe.probe().await.gpu_available);
        assert!(probe.probe().await.gpu_available);
        assert_eq!(gpu.live_devices(), 0);
    }

    #[tokio::test]
    async fn repeated_full_reports_share_a_device() {
        let gpu = Arc::new(SoftwareGpu::default());
        let probe = CapabilityProbe::new(gpu.clone(), Arc::new(LibWebpCodec::new()));
        let a = probe.probe_full().await.device.unwrap();
        let b = probe.probe_full().await.device.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(gpu.live_devices(), 1);
    }

    #[tokio::test]
    async fn nothing_available() {
        let probe = CapabilityProbe::new(Arc::new(UnavailableGpu), Arc::new(UnavailableCodec));
        let caps = probe.probe().await;
        assert!(!caps.gpu_available);
        assert!(!caps.native_codec_available);
    }

    #[tokio::test]
    async fn panics_are_treated_as_absent() {
        let probe = CapabilityProbe::new(Arc::new(PanickingGpu), Arc::new(PanickingCodec));
        let report = probe.probe_full().await;
        assert!(!report.capabilities.gpu_available);
        assert!(report.device.is_none());
        assert!(!report.capabilities.native_codec_available);
    }

    #[tokio::test]
    async fn overrides_force_absence() {
        let mut config = Config::default();
        config.probe = ProbeConfig {
            disable_gpu: true,
            disable_native_codec: true,
            disable_workers: true,
            disable_progressive: false,
        };
        let probe =
            CapabilityProbe::new(Arc::new(SoftwareGpu::default()), Arc::new(LibWebpCodec::new()))
                .with_config(&config);
        let caps = probe.probe().await;
        assert_eq!(
            caps,
            Capabilities {
                performance_class: caps.performance_class,
                ..Capabilities::none()
            }
        );
    }

    #[tokio::test]
    async fn progressive_implies_worker() {
        let probe = CapabilityProbe::with_defaults();
        let caps = probe.probe().await;
        if caps.progressive_supported {
            assert!(caps.worker_available);
        }
    }

    #[tokio::test]
    async fn disabled_benchmark_is_unknown() {
        let mut config = Config::default();
        config.benchmark.iterations = 0;
        let probe = CapabilityProbe::with_defaults().with_config(&config);
        let report = probe.probe_full().await;
        assert_eq!(report.capabilities.performance_class, PerformanceClass::Unknown);
        assert!(report.benchmark_ms.is_none());
    }

    #[tokio::test]
    async fn probe_is_idempotent() {
        let probe = CapabilityProbe::new(Arc::new(UnavailableGpu), Arc::new(LibWebpCodec::new()));
        let a = probe.probe().await;
        let b = probe.probe().await;
        assert_eq!(a.gpu_available, b.gpu_available);
        assert_eq!(a.worker_available, b.worker_available);
        assert_eq!(a.native_codec_available, b.native_codec_available);
    }

    #[tokio::test]
    async fn cached_returns_same_report() {
        let probe = CapabilityProbe::with_defaults();
        let a = probe.cached().await;
        let b = probe.cached().await;
        assert!(std::ptr::eq(a, b));
    }
}
