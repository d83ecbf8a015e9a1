//! The conversion orchestrator: one fallback loop over a selected plan.
//!
//! Attempts run strictly one after another. Recoverable failures advance to
//! the next entry; cancellation and malformed input end the conversion at
//! once. The request time budget is cumulative: once it is spent, every
//! remaining non-baseline entry is skipped and the baseline runs under its
//! own timeout.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use wf_core::config::Config;
use wf_core::events::ConversionEvent;
use wf_core::{
    Attempt, AttemptOutcome, BackendKind, Capabilities, ConversionPlan, ConversionReport,
    ConversionState, EncodeOptions, EncodedResult, Error, ImageBuffer, Preferences, Result,
};

use crate::backend::EncoderBackend;
use crate::context::EncodeContext;
use crate::registry::BackendRegistry;
use crate::selector::StrategySelector;

/// Runs conversions against a fixed set of capabilities and backends.
///
/// Built after probing: `CapabilityProbe::probe` first, then
/// `ConversionOrchestrator::new` with the result.
pub struct ConversionOrchestrator {
    capabilities: Capabilities,
    registry: BackendRegistry,
    selector: StrategySelector,
    baseline_timeout: Duration,
}

impl ConversionOrchestrator {
    pub fn new(capabilities: Capabilities, registry: BackendRegistry) -> Self {
        Self {
            capabilities: capabilities.normalized(),
            registry,
            selector: StrategySelector::default(),
            baseline_timeout: Config::default().orchestrator.baseline_timeout(),
        }
    }

    /// Builder: take selection thresholds and the baseline timeout from config.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.selector = StrategySelector::new(config.selection);
        self.baseline_timeout = config.orchestrator.baseline_timeout();
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// The plan a conversion of `input_size_bytes` would follow.
    pub fn plan(
        &self,
        input_size_bytes: usize,
        options: &EncodeOptions,
        preferences: &Preferences,
    ) -> ConversionPlan {
        self.selector
            .select_plan(&self.capabilities, input_size_bytes, preferences, options)
    }

    /// Convert with a fresh context (no cancellation, no events).
    pub async fn convert(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        preferences: &Preferences,
    ) -> Result<ConversionReport> {
        self.convert_with(image, options, preferences, &EncodeContext::new())
            .await
    }

    /// Convert under a caller-supplied context.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for a malformed image or options, before any
    ///   attempt or from a backend.
    /// - [`Error::Cancelled`] as soon as the context is cancelled.
    /// - [`Error::AllStrategiesFailed`] with the full attempt history when
    ///   the baseline fails too.
    pub async fn convert_with(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        preferences: &Preferences,
        ctx: &EncodeContext,
    ) -> Result<ConversionReport> {
        image.validate()?;
        options.validate()?;
        ctx.check_cancelled()?;

        let started = Instant::now();
        let budget = Duration::from_millis(u64::from(options.time_budget_ms));

        ctx.emit(ConversionEvent::StateChanged {
            state: ConversionState::Selecting,
        });
        let plan = self.plan(image.byte_len(), options, preferences);
        tracing::info!(
            width = image.width(),
            height = image.height(),
            plan = ?plan.kinds(),
            budget_ms = options.time_budget_ms,
            "starting conversion"
        );

        let entries = plan.into_entries();
        let last = entries.len() - 1;
        let mut source = Some(image);
        let mut attempts: Vec<Attempt> = Vec::with_capacity(entries.len());
        let mut skipped: Vec<BackendKind> = Vec::new();

        for (position, entry) in entries.into_iter().enumerate() {
            let kind = entry.backend;
            let is_baseline = kind == BackendKind::Baseline;
            let elapsed = started.elapsed();

            if !is_baseline && elapsed >= budget {
                tracing::warn!(
                    backend = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "time budget spent; skipping"
                );
                skipped.push(kind);
                ctx.emit(ConversionEvent::AttemptSkipped { backend: kind });
                continue;
            }

            let input = if position == last {
                source.take()
            } else {
                source.clone()
            };
            let Some(input) = input else {
                return Err(Error::Internal("image consumed before final attempt".into()));
            };

            let attempt_started = Instant::now();
            ctx.emit(ConversionEvent::StateChanged {
                state: ConversionState::Attempting(kind),
            });
            ctx.emit(ConversionEvent::AttemptStarted {
                backend: kind,
                position,
            });

            let outcome = match self.registry.get(kind) {
                Some(backend) => {
                    let limit = if is_baseline {
                        self.baseline_timeout
                    } else {
                        budget.saturating_sub(elapsed)
                    };
                    let mut opts = entry.options;
                    opts.time_budget_ms = budget_ms(limit);
                    run_attempt(backend.as_ref(), input, &opts, ctx, limit).await
                }
                None => Err(Error::unavailable(kind, "no backend registered")),
            };
            let elapsed_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(result) => {
                    attempts.push(Attempt {
                        backend: kind,
                        outcome: AttemptOutcome::Succeeded,
                        elapsed_ms,
                    });
                    let report = build_report(kind, result, attempts, skipped, started);
                    tracing::info!(
                        method = %kind,
                        attempts = report.attempts.len(),
                        compressed = report.result.compressed_size,
                        ratio = report.result.compression_ratio,
                        total_ms = report.total_time_ms,
                        "conversion succeeded"
                    );
                    ctx.emit(ConversionEvent::Completed {
                        backend: kind,
                        compressed_size: report.result.compressed_size,
                        total_time_ms: report.total_time_ms,
                    });
                    ctx.emit(ConversionEvent::StateChanged {
                        state: ConversionState::Succeeded,
                    });
                    return Ok(report);
                }
                Err(Error::Cancelled) => {
                    tracing::info!(backend = %kind, "conversion cancelled");
                    ctx.emit(ConversionEvent::StateChanged {
                        state: ConversionState::Failed,
                    });
                    return Err(Error::Cancelled);
                }
                Err(e) if !e.is_recoverable() => {
                    tracing::warn!(backend = %kind, error = %e, "unrecoverable failure");
                    ctx.emit(ConversionEvent::StateChanged {
                        state: ConversionState::Failed,
                    });
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %kind,
                        error = %e,
                        elapsed_ms,
                        "attempt failed; falling back"
                    );
                    ctx.emit(ConversionEvent::AttemptFailed {
                        backend: kind,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                    attempts.push(Attempt {
                        backend: kind,
                        outcome: AttemptOutcome::failed(&e),
                        elapsed_ms,
                    });
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "every strategy failed");
        ctx.emit(ConversionEvent::StateChanged {
            state: ConversionState::Failed,
        });
        Err(Error::AllStrategiesFailed { attempts })
    }
}

impl std::fmt::Debug for ConversionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionOrchestrator")
            .field("capabilities", &self.capabilities)
            .field("registry", &self.registry)
            .field("baseline_timeout", &self.baseline_timeout)
            .finish_non_exhaustive()
    }
}

/// A limit as an option budget, never zero.
fn budget_ms(limit: Duration) -> u32 {
    limit.as_millis().clamp(1, u128::from(u32::MAX)) as u32
}

/// Run one backend under the limit, converting panics and timeouts into
/// errors and dropping the attempt on cancellation.
async fn run_attempt(
    backend: &dyn EncoderBackend,
    image: ImageBuffer,
    options: &EncodeOptions,
    ctx: &EncodeContext,
    limit: Duration,
) -> Result<EncodedResult> {
    let kind = backend.kind();
    let work = AssertUnwindSafe(backend.encode(image, options, ctx)).catch_unwind();

    let finished = tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => return Err(Error::Cancelled),
        finished = tokio::time::timeout(limit, work) => finished,
    };

    match finished {
        Err(_) => Err(Error::timeout(kind, limit.as_millis() as u64)),
        Ok(Err(_)) => Err(Error::Internal(format!("{kind} backend panicked"))),
        Ok(Ok(result)) => result.and_then(|r| verify(kind, r)),
    }
}

/// Reject results whose sizes are inconsistent with their bytes.
fn verify(kind: BackendKind, result: EncodedResult) -> Result<EncodedResult> {
    if result.compressed_size == 0 || result.compressed_size != result.bytes.len() {
        return Err(Error::Internal(format!(
            "{kind} returned an inconsistent result: {} bytes reported, {} produced",
            result.compressed_size,
            result.bytes.len()
        )));
    }
    Ok(result)
}

fn build_report(
    method: BackendKind,
    result: EncodedResult,
    attempts: Vec<Attempt>,
    skipped: Vec<BackendKind>,
    started: Instant,
) -> ConversionReport {
    let mut optimizations_applied: BTreeSet<String> =
        result.optimizations.iter().cloned().collect();
    if attempts.len() > 1 {
        optimizations_applied.insert("fallback".to_string());
    }
    if !skipped.is_empty() {
        optimizations_applied.insert("time-budget-exceeded".to_string());
    }
    ConversionReport {
        method,
        result,
        attempts,
        skipped,
        total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        optimizations_applied,
    }
}
