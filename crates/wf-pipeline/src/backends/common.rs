//! Steps shared by several backends.

use std::time::Instant;

use wf_codec::ops;
use wf_core::{BackendKind, EncodeOptions, Error, ImageBuffer, Result};

use crate::analysis::{self, ImageKind};

pub(crate) const SHARPEN_SIGMA: f32 = 0.8;
pub(crate) const SHARPEN_THRESHOLD: i32 = 2;

/// An image fitted to the requested bounds and (optionally) enhanced.
pub(crate) struct Prepared {
    pub image: ImageBuffer,
    pub tags: Vec<String>,
}

/// Downscale to the option bounds and sharpen when enhancement is on.
pub(crate) fn prepare(image: ImageBuffer, options: &EncodeOptions) -> Result<Prepared> {
    let mut tags = Vec::new();
    let (mut image, resized) = ops::fit_within(image, options.max_width, options.max_height)?;
    if resized {
        tags.push("downscaled".to_string());
    }
    if options.enable_enhancement {
        image = ops::sharpen(image, SHARPEN_SIGMA, SHARPEN_THRESHOLD)?;
        tags.push("enhanced".to_string());
    }
    Ok(Prepared { image, tags })
}

/// Target quality after adaptive adjustment, with the image kind if the
/// image was analysed.
pub(crate) fn target_quality(
    image: &ImageBuffer,
    options: &EncodeOptions,
) -> (f32, Option<ImageKind>) {
    if !options.adaptive_quality || options.lossless {
        return (options.quality, None);
    }
    let kind = analysis::analyze(image).kind;
    (analysis::adaptive_quality(options.quality, kind), Some(kind))
}

/// Tags describing an adaptive quality decision.
pub(crate) fn quality_tags(kind: Option<ImageKind>) -> Vec<String> {
    match kind {
        Some(kind) => vec!["adaptive-quality".to_string(), format!("image-type:{kind}")],
        None => Vec::new(),
    }
}

/// Fail with a timeout once `options.time_budget_ms` has elapsed.
pub(crate) fn check_budget(
    kind: BackendKind,
    started: Instant,
    options: &EncodeOptions,
) -> Result<()> {
    let budget_ms = u64::from(options.time_budget_ms);
    if started.elapsed().as_millis() >= u128::from(budget_ms) {
        return Err(Error::timeout(kind, budget_ms));
    }
    Ok(())
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
