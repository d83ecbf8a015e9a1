//! Encode results, conversion plans, attempt histories, and the final report.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, FailureKind, Result};
use crate::types::{BackendKind, EncodeOptions};

// ---------------------------------------------------------------------------
// EncodedResult
// ---------------------------------------------------------------------------

/// Output of a successful backend encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedResult {
    /// Encoded WebP bytes.
    pub bytes: Vec<u8>,
    /// Uncompressed RGBA8 size of the input image.
    pub original_size: usize,
    /// Length of `bytes`.
    pub compressed_size: usize,
    /// `original_size / compressed_size`.
    pub compression_ratio: f64,
    /// Quality actually used, which adaptive backends may change.
    pub actual_quality: f32,
    pub encoding_time_ms: f64,
    /// Tags describing optimizations this backend applied.
    pub optimizations: Vec<String>,
}

impl EncodedResult {
    /// Build a result, deriving the compressed size and ratio from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if `bytes` is empty: a zero-length encode is
    /// never a success.
    pub fn new(
        codec: &str,
        bytes: Vec<u8>,
        original_size: usize,
        actual_quality: f32,
        encoding_time_ms: f64,
    ) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::codec(codec, "encoder produced no bytes"));
        }
        let compressed_size = bytes.len();
        Ok(Self {
            bytes,
            original_size,
            compressed_size,
            compression_ratio: compression_ratio(original_size, compressed_size),
            actual_quality,
            encoding_time_ms,
            optimizations: Vec::new(),
        })
    }

    /// Builder: attach optimization tags.
    pub fn with_optimizations(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.optimizations.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// `original / compressed`, or `1.0` when nothing was produced.
pub fn compression_ratio(original_size: usize, compressed_size: usize) -> f64 {
    if compressed_size == 0 {
        1.0
    } else {
        original_size as f64 / compressed_size as f64
    }
}

// ---------------------------------------------------------------------------
// ConversionPlan
// ---------------------------------------------------------------------------

/// One candidate in a plan: a backend and the options tuned for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub backend: BackendKind,
    pub options: EncodeOptions,
}

/// Ordered candidates, highest preference first, always ending in
/// [`BackendKind::Baseline`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionPlan {
    entries: Vec<PlanEntry>,
}

impl ConversionPlan {
    /// Build a plan from ranked candidates.
    ///
    /// Duplicate kinds keep their first occurrence, any `Baseline` candidate
    /// is dropped, and a single `Baseline` entry with `baseline_options` is
    /// appended, so the plan is never empty.
    pub fn new(
        candidates: impl IntoIterator<Item = PlanEntry>,
        baseline_options: EncodeOptions,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<PlanEntry> = candidates
            .into_iter()
            .filter(|e| e.backend != BackendKind::Baseline && seen.insert(e.backend))
            .collect();
        entries.push(PlanEntry {
            backend: BackendKind::Baseline,
            options: baseline_options,
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// The preferred candidate.
    pub fn primary(&self) -> BackendKind {
        self.entries[0].backend
    }

    /// Backend kinds in plan order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.entries.iter().map(|e| e.backend).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<PlanEntry> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// How one plan entry resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { kind: FailureKind, reason: String },
}

impl AttemptOutcome {
    /// Record a failure from an error.
    pub fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A single executed plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub backend: BackendKind,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: f64,
}

// ---------------------------------------------------------------------------
// ConversionState
// ---------------------------------------------------------------------------

/// Per-call conversion state machine.
///
/// `Selecting -> Attempting(kind) -> {Attempting(next) | Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "backend", rename_all = "snake_case")]
pub enum ConversionState {
    Selecting,
    Attempting(BackendKind),
    Succeeded,
    Failed,
}

impl ConversionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// ConversionReport
// ---------------------------------------------------------------------------

/// Unified result envelope returned by a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Backend that produced `result`.
    pub method: BackendKind,
    pub result: EncodedResult,
    /// Executed attempts in order; the last one is the success.
    pub attempts: Vec<Attempt>,
    /// Candidates passed over because the time budget ran out.
    pub skipped: Vec<BackendKind>,
    pub total_time_ms: f64,
    pub optimizations_applied: BTreeSet<String>,
}

impl ConversionReport {
    /// Whether the conversion had to fall back from the primary candidate.
    pub fn degraded(&self) -> bool {
        self.attempts.len() > 1 || !self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: BackendKind) -> PlanEntry {
        PlanEntry {
            backend: kind,
            options: EncodeOptions::default(),
        }
    }

    #[test]
    fn ratio_guards_zero() {
        assert_eq!(compression_ratio(100, 0), 1.0);
        assert_eq!(compression_ratio(2_000_000, 500_000), 4.0);
    }

    #[test]
    fn encoded_result_derives_sizes() {
        let r = EncodedResult::new("test", vec![0; 500_000], 2_000_000, 0.8, 1.0).unwrap();
        assert_eq!(r.compressed_size, 500_000);
        assert_eq!(r.compression_ratio, 4.0);
    }

    #[test]
    fn encoded_result_rejects_empty() {
        let err = EncodedResult::new("test", vec![], 16, 0.8, 0.0).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }

    #[test]
    fn plan_appends_baseline_once() {
        let plan = ConversionPlan::new(
            vec![
                entry(BackendKind::CpuStandard),
                entry(BackendKind::Baseline),
                entry(BackendKind::CpuStandard),
                entry(BackendKind::GpuStandard),
            ],
            EncodeOptions::default(),
        );
        assert_eq!(
            plan.kinds(),
            vec![
                BackendKind::CpuStandard,
                BackendKind::GpuStandard,
                BackendKind::Baseline
            ]
        );
        assert_eq!(plan.primary(), BackendKind::CpuStandard);
    }

    #[test]
    fn empty_candidates_yield_baseline_plan() {
        let plan = ConversionPlan::new(Vec::new(), EncodeOptions::default());
        assert_eq!(plan.kinds(), vec![BackendKind::Baseline]);
        assert!(!plan.is_empty());
    }

    #[test]
    fn attempt_outcome_serializes_tagged() {
        let outcome = AttemptOutcome::failed(&Error::timeout(BackendKind::GpuStandard, 5));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn terminal_states() {
        assert!(ConversionState::Succeeded.is_terminal());
        assert!(ConversionState::Failed.is_terminal());
        assert!(!ConversionState::Selecting.is_terminal());
        assert!(!ConversionState::Attempting(BackendKind::Baseline).is_terminal());
    }
}
