//! Strategy selection.
//!
//! A fixed-priority table of [`Rule`]s is evaluated in a single pass. The
//! first rule that applies names the primary candidate; every other rule
//! that applies follows in table order, and the baseline always closes the
//! plan. Selection is a pure function of its inputs.
//!
//! | # | Backend         | Applies when                                                        |
//! |---|-----------------|---------------------------------------------------------------------|
//! | 1 | `WasmLossless`  | wasm lossless + wasm enabled, native codec                           |
//! | 2 | `GpuWasmHybrid` | prefer GPU + wasm enabled, GPU + native codec, large input, high class |
//! | 3 | `WasmOptimized` | wasm enabled, native codec                                           |
//! | 4 | `GpuProgressive`| prefer GPU + progressive enabled, GPU + streaming, large input       |
//! | 5 | `GpuStandard`   | prefer GPU, GPU, high class                                          |
//! | 6 | `CpuProgressive`| progressive enabled, streaming, large or complex input               |
//! | 7 | `CpuStandard`   | workers, class not low                                               |
//!
//! Rule 3's size condition ("complex, or else small") covers every input
//! size, so it reduces to the codec and preference checks.

use wf_core::config::SelectionConfig;
use wf_core::{
    BackendKind, Capabilities, ConversionPlan, EncodeOptions, PerformanceClass, PlanEntry,
    Preferences,
};

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub capabilities: &'a Capabilities,
    pub input_size_bytes: usize,
    pub preferences: &'a Preferences,
    pub thresholds: &'a SelectionConfig,
}

impl SelectionInput<'_> {
    /// At or above the large threshold.
    pub fn is_large(&self) -> bool {
        self.input_size_bytes >= self.thresholds.large_input_bytes
    }

    /// At or above the complex threshold.
    pub fn is_complex(&self) -> bool {
        self.input_size_bytes >= self.thresholds.complex_input_bytes
    }

    /// Below the complex threshold.
    pub fn is_small(&self) -> bool {
        !self.is_complex()
    }
}

/// One row of the selection table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub backend: BackendKind,
    pub description: &'static str,
    pub applies: fn(&SelectionInput<'_>) -> bool,
}

/// The selection table in priority order. `Baseline` is implicit.
pub static RULES: [Rule; 7] = [
    Rule {
        backend: BackendKind::WasmLossless,
        description: "lossless native codec requested",
        applies: wasm_lossless,
    },
    Rule {
        backend: BackendKind::GpuWasmHybrid,
        description: "large input on a high-class GPU with native codec",
        applies: gpu_wasm_hybrid,
    },
    Rule {
        backend: BackendKind::WasmOptimized,
        description: "native codec available",
        applies: wasm_optimized,
    },
    Rule {
        backend: BackendKind::GpuProgressive,
        description: "large input on a GPU with streaming",
        applies: gpu_progressive,
    },
    Rule {
        backend: BackendKind::GpuStandard,
        description: "high-class GPU",
        applies: gpu_standard,
    },
    Rule {
        backend: BackendKind::CpuProgressive,
        description: "large or complex input with streaming",
        applies: cpu_progressive,
    },
    Rule {
        backend: BackendKind::CpuStandard,
        description: "workers on a non-low class machine",
        applies: cpu_standard,
    },
];

fn wasm_lossless(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.wasm_lossless && p.enable_wasm && c.native_codec_available
}

fn gpu_wasm_hybrid(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.prefer_gpu
        && p.enable_wasm
        && c.gpu_available
        && c.native_codec_available
        && i.is_large()
        && c.performance_class == PerformanceClass::High
}

fn wasm_optimized(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.enable_wasm && c.native_codec_available && (i.is_complex() || i.is_small())
}

fn gpu_progressive(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.prefer_gpu
        && c.gpu_available
        && p.enable_progressive
        && c.progressive_supported
        && i.is_large()
}

fn gpu_standard(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.prefer_gpu && c.gpu_available && c.performance_class == PerformanceClass::High
}

fn cpu_progressive(i: &SelectionInput<'_>) -> bool {
    let (p, c) = (i.preferences, i.capabilities);
    p.enable_progressive && c.progressive_supported && (i.is_large() || i.is_complex())
}

fn cpu_standard(i: &SelectionInput<'_>) -> bool {
    i.capabilities.worker_available && i.capabilities.performance_class != PerformanceClass::Low
}

/// Builds conversion plans from the rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector {
    thresholds: SelectionConfig,
}

impl StrategySelector {
    pub fn new(thresholds: SelectionConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SelectionConfig {
        &self.thresholds
    }

    /// Rules that apply to the inputs, in priority order.
    pub fn matching_rules(
        &self,
        capabilities: &Capabilities,
        input_size_bytes: usize,
        preferences: &Preferences,
    ) -> Vec<&'static Rule> {
        let capabilities = capabilities.normalized();
        let input = SelectionInput {
            capabilities: &capabilities,
            input_size_bytes,
            preferences,
            thresholds: &self.thresholds,
        };
        RULES.iter().filter(|rule| (rule.applies)(&input)).collect()
    }

    /// The backend the first applicable rule names, or `Baseline`.
    pub fn primary(
        &self,
        capabilities: &Capabilities,
        input_size_bytes: usize,
        preferences: &Preferences,
    ) -> BackendKind {
        self.matching_rules(capabilities, input_size_bytes, preferences)
            .first()
            .map_or(BackendKind::Baseline, |rule| rule.backend)
    }

    /// Build a plan. Each entry carries `options` tuned for its backend.
    pub fn select_plan(
        &self,
        capabilities: &Capabilities,
        input_size_bytes: usize,
        preferences: &Preferences,
        options: &EncodeOptions,
    ) -> ConversionPlan {
        let candidates = self
            .matching_rules(capabilities, input_size_bytes, preferences)
            .into_iter()
            .map(|rule| PlanEntry {
                backend: rule.backend,
                options: tune_options(rule.backend, options),
            });
        let plan = ConversionPlan::new(candidates, tune_options(BackendKind::Baseline, options));
        tracing::debug!(input_size_bytes, plan = ?plan.kinds(), "plan selected");
        plan
    }
}

/// Per-backend adjustments to the request options.
fn tune_options(backend: BackendKind, options: &EncodeOptions) -> EncodeOptions {
    let mut tuned = options.clone();
    match backend {
        BackendKind::WasmLossless => {
            tuned.lossless = true;
            tuned.quality = 1.0;
        }
        BackendKind::Baseline => {
            tuned.enable_enhancement = false;
            tuned.adaptive_quality = false;
        }
        _ => {}
    }
    tuned
}
