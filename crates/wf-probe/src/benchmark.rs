//! Timed micro-benchmark and performance classification.
//!
//! The classification is an explicitly approximate heuristic. It only biases
//! strategy selection and must never be treated as a measurement.

use std::hint::black_box;
use std::time::Instant;

use wf_core::config::BenchmarkConfig;
use wf_core::PerformanceClass;

/// Time a fixed floating-point loop, returning elapsed milliseconds.
///
/// Returns `None` when the benchmark is disabled (zero iterations).
pub fn run_benchmark(iterations: u32) -> Option<f64> {
    if iterations == 0 {
        return None;
    }
    let start = Instant::now();
    let mut acc = 0.0f64;
    for i in 0..iterations {
        let x = black_box(f64::from(i));
        acc += x.sqrt().sin();
    }
    black_box(acc);
    Some(start.elapsed().as_secs_f64() * 1000.0)
}

/// Classify a benchmark timing.
///
/// - Faster than `high_threshold_ms` with GPU or workers available: `High`.
/// - Faster than `medium_threshold_ms`: `Medium`.
/// - Anything slower: `Low`.
/// - No timing: `Unknown`.
pub fn classify(
    elapsed_ms: Option<f64>,
    gpu_available: bool,
    worker_available: bool,
    cfg: &BenchmarkConfig,
) -> PerformanceClass {
    let Some(ms) = elapsed_ms.filter(|ms| ms.is_finite()) else {
        return PerformanceClass::Unknown;
    };
    if ms < cfg.high_threshold_ms && (gpu_available || worker_available) {
        PerformanceClass::High
    } else if ms < cfg.medium_threshold_ms {
        PerformanceClass::Medium
    } else {
        PerformanceClass::Low
    }
}
