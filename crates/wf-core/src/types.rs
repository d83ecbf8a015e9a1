//! Domain enums and value types: backend kinds, runtime capabilities, encode
//! options, and selection preferences.
//!
//! Enums serialize in kebab-case and implement `Display` with the same
//! spelling so log fields, reports, and configuration agree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// Every encoding strategy the pipeline can plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Native codec, lossless mode.
    WasmLossless,
    /// GPU preprocessing followed by native codec byte encoding.
    GpuWasmHybrid,
    /// Native codec with image-type tuned presets.
    WasmOptimized,
    /// GPU preprocessing with a streamed quality ladder.
    GpuProgressive,
    /// GPU preprocessing, single encode.
    GpuStandard,
    /// Quality ladder encoded on a worker.
    CpuProgressive,
    /// Single encode on a worker with adaptive quality.
    CpuStandard,
    /// Synchronous encode with no optional capability required.
    Baseline,
}

impl BackendKind {
    /// All kinds in rule priority order; `Baseline` is last.
    pub const ALL: [BackendKind; 8] = [
        BackendKind::WasmLossless,
        BackendKind::GpuWasmHybrid,
        BackendKind::WasmOptimized,
        BackendKind::GpuProgressive,
        BackendKind::GpuStandard,
        BackendKind::CpuProgressive,
        BackendKind::CpuStandard,
        BackendKind::Baseline,
    ];

    /// Whether this strategy submits work to the GPU collaborator.
    pub fn uses_gpu(self) -> bool {
        matches!(
            self,
            Self::GpuWasmHybrid | Self::GpuProgressive | Self::GpuStandard
        )
    }

    /// Whether this strategy encodes through the native codec collaborator.
    pub fn uses_native_codec(self) -> bool {
        matches!(
            self,
            Self::WasmLossless | Self::GpuWasmHybrid | Self::WasmOptimized
        )
    }

    /// Whether this strategy streams a quality ladder.
    pub fn is_progressive(self) -> bool {
        matches!(self, Self::GpuProgressive | Self::CpuProgressive)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WasmLossless => write!(f, "wasm-lossless"),
            Self::GpuWasmHybrid => write!(f, "gpu-wasm-hybrid"),
            Self::WasmOptimized => write!(f, "wasm-optimized"),
            Self::GpuProgressive => write!(f, "gpu-progressive"),
            Self::GpuStandard => write!(f, "gpu-standard"),
            Self::CpuProgressive => write!(f, "cpu-progressive"),
            Self::CpuStandard => write!(f, "cpu-standard"),
            Self::Baseline => write!(f, "baseline"),
        }
    }
}

// ---------------------------------------------------------------------------
// PerformanceClass
// ---------------------------------------------------------------------------

/// Coarse, best-effort performance classification from the probe benchmark.
///
/// Never authoritative: it only biases strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceClass {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl fmt::Display for PerformanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Runtime capabilities detected once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub gpu_available: bool,
    pub worker_available: bool,
    /// Streaming support. Only meaningful when `worker_available` is set.
    pub progressive_supported: bool,
    pub native_codec_available: bool,
    pub performance_class: PerformanceClass,
}

impl Capabilities {
    /// Capabilities of an environment with nothing optional available.
    pub fn none() -> Self {
        Self::default()
    }

    /// Return a copy where `progressive_supported` implies `worker_available`.
    pub fn normalized(mut self) -> Self {
        if !self.worker_available {
            self.progressive_supported = false;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// EncodeOptions
// ---------------------------------------------------------------------------

/// Per-request encoding options. Immutable once handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Target quality in `[0, 1]`.
    pub quality: f32,
    pub max_width: u32,
    pub max_height: u32,
    pub lossless: bool,
    pub enable_enhancement: bool,
    pub adaptive_quality: bool,
    /// Cumulative wall-clock budget for the whole conversion.
    pub time_budget_ms: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 0.8,
            max_width: 4096,
            max_height: 4096,
            lossless: false,
            enable_enhancement: false,
            adaptive_quality: true,
            time_budget_ms: 30_000,
        }
    }
}

impl EncodeOptions {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a non-finite or out-of-range
    /// quality, zero maximum dimensions, or a zero time budget.
    pub fn validate(&self) -> Result<()> {
        if !self.quality.is_finite() || !(0.0..=1.0).contains(&self.quality) {
            return Err(Error::invalid(format!(
                "quality must be within [0, 1] (got {})",
                self.quality
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(Error::invalid(format!(
                "maximum dimensions must be non-zero (got {}x{})",
                self.max_width, self.max_height
            )));
        }
        if self.time_budget_ms == 0 {
            return Err(Error::invalid("time budget must be non-zero"));
        }
        Ok(())
    }

    /// Quality mapped onto the 0-100 scale used by codecs.
    pub fn quality_percent(&self) -> f32 {
        (self.quality * 100.0).clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Caller preferences that gate which strategies may be planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub prefer_gpu: bool,
    pub enable_progressive: bool,
    pub enable_wasm: bool,
    pub wasm_lossless: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            prefer_gpu: true,
            enable_progressive: true,
            enable_wasm: true,
            wasm_lossless: false,
        }
    }
}
