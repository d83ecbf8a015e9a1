//! Tracing subscriber setup.
//!
//! `RUST_LOG` always wins; otherwise the default filter for the chosen
//! verbosity applies.

use wf_core::{Error, Result};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "webpforge=info,wf_pipeline=info,wf_probe=info,wf_codec=warn";

/// Filter used when `RUST_LOG` is unset and verbose output is requested.
pub const VERBOSE_FILTER: &str =
    "webpforge=trace,wf_pipeline=trace,wf_probe=debug,wf_codec=debug,wf_core=debug";

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install a global fmt subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] if the filter does not parse or a global
/// subscriber is already installed.
pub fn try_init(verbose: bool) -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(verbose).to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|e| Error::Config(format!("invalid log filter {filter:?}: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialised: {e}")))
}

/// Like [`try_init`], ignoring an already-installed subscriber.
pub fn init(verbose: bool) {
    if let Err(e) = try_init(verbose) {
        tracing::debug!("{e}");
    }
}
