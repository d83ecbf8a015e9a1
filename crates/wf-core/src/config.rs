//! Pipeline configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! selection thresholds, probe benchmark settings, capability overrides, and
//! request defaults. Every section defaults sensibly so a completely empty
//! `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::types::{EncodeOptions, Preferences};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selection: SelectionConfig,
    pub benchmark: BenchmarkConfig,
    pub probe: ProbeConfig,
    pub defaults: EncodeOptions,
    pub preferences: Preferences,
    pub orchestrator: OrchestratorConfig,
    pub progressive: ProgressiveConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.selection.complex_input_bytes > self.selection.large_input_bytes {
            warnings.push(format!(
                "selection.complex_input_bytes ({}) exceeds large_input_bytes ({})",
                self.selection.complex_input_bytes, self.selection.large_input_bytes
            ));
        }

        if self.benchmark.high_threshold_ms >= self.benchmark.medium_threshold_ms {
            warnings.push(format!(
                "benchmark.high_threshold_ms ({}) should be below medium_threshold_ms ({})",
                self.benchmark.high_threshold_ms, self.benchmark.medium_threshold_ms
            ));
        }

        if self.benchmark.iterations == 0 {
            warnings.push("benchmark.iterations is 0; performance class will be unknown".into());
        }

        if let Err(e) = self.defaults.validate() {
            warnings.push(format!("defaults: {e}"));
        }

        if self.orchestrator.baseline_timeout_ms == 0 {
            warnings.push(
                "orchestrator.baseline_timeout_ms is 0; baseline will always time out".into(),
            );
        }

        for (i, q) in self.progressive.ladder.iter().enumerate() {
            if !(0.0..=1.0).contains(q) {
                warnings.push(format!("progressive.ladder[{i}] ({q}) is outside [0, 1]"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Input-size thresholds used by strategy selection.
///
/// Sizes are RGBA8 byte equivalents (`width * height * 4`). Both bounds are
/// inclusive: a size exactly at a threshold counts as large/complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub large_input_bytes: usize,
    pub complex_input_bytes: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            large_input_bytes: 5_000_000,
            complex_input_bytes: 1_000_000,
        }
    }
}

/// Micro-benchmark used to derive the performance class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub iterations: u32,
    /// Elapsed time below this (with GPU or workers) classifies as high.
    pub high_threshold_ms: f64,
    /// Elapsed time below this classifies as medium; anything slower is low.
    pub medium_threshold_ms: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            high_threshold_ms: 10.0,
            medium_threshold_ms: 50.0,
        }
    }
}

/// Overrides that force capabilities absent regardless of detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub disable_gpu: bool,
    pub disable_native_codec: bool,
    pub disable_workers: bool,
    pub disable_progressive: bool,
}

/// Orchestrator limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Time allowed for the baseline attempt, which is not bound by the
    /// request budget.
    pub baseline_timeout_ms: u64,
}

impl OrchestratorConfig {
    pub fn baseline_timeout(&self) -> Duration {
        Duration::from_millis(self.baseline_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            baseline_timeout_ms: 30_000,
        }
    }
}

/// Quality ladder for progressive backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressiveConfig {
    /// Preview qualities encoded before the requested one. Entries at or above
    /// the target quality are dropped.
    pub ladder: Vec<f32>,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            ladder: vec![0.3, 0.6],
        }
    }
}

impl ProgressiveConfig {
    /// Stage qualities for a target: ascending previews, then the target.
    pub fn stages_for(&self, target: f32) -> Vec<f32> {
        let mut stages: Vec<f32> = self
            .ladder
            .iter()
            .copied()
            .filter(|q| q.is_finite() && *q >= 0.0 && *q < target)
            .collect();
        stages.sort_by(f32::total_cmp);
        stages.dedup();
        stages.push(target);
        stages
    }
}
