//! Unified error type for the webpforge pipeline.
//!
//! All crates funnel their failures into [`Error`]. The orchestrator consults
//! [`Error::is_recoverable`] to decide whether a failed attempt advances to the
//! next plan entry or ends the conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::Attempt;

/// Unified error type covering all failure modes in webpforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A capability assumed present at selection time is not usable now.
    #[error("Backend unavailable [{backend}]: {reason}")]
    BackendUnavailable {
        /// Backend (or collaborator) that could not be used.
        backend: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A backend exceeded its allotted time budget.
    #[error("Timeout [{backend}]: exceeded {budget_ms} ms")]
    Timeout {
        /// Backend that ran out of time.
        backend: String,
        /// Budget that was exceeded, in milliseconds.
        budget_ms: u64,
    },

    /// The image buffer or encode options are malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller cancelled the conversion.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Every plan entry, including the baseline, failed.
    #[error("All strategies failed after {} attempt(s)", attempts.len())]
    AllStrategiesFailed {
        /// Full attempt history, in execution order.
        attempts: Vec<Attempt>,
    },

    /// A codec collaborator failed to produce bytes.
    #[error("Codec error [{codec}]: {message}")]
    Codec {
        /// Name of the codec that failed.
        codec: String,
        /// Human-readable error description.
        message: String,
    },

    /// Turning a source into pixels failed.
    #[error("Raster error: {0}")]
    Raster(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors (including caught panics).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure classification recorded in attempt histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendUnavailable,
    Timeout,
    InvalidInput,
    Cancelled,
    AllStrategiesFailed,
    Codec,
    Raster,
    Config,
    Io,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BackendUnavailable => "backend_unavailable",
            Self::Timeout => "timeout",
            Self::InvalidInput => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::AllStrategiesFailed => "all_strategies_failed",
            Self::Codec => "codec",
            Self::Raster => "raster",
            Self::Config => "config",
            Self::Io => "io",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::BackendUnavailable { .. } => FailureKind::BackendUnavailable,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::InvalidInput(_) => FailureKind::InvalidInput,
            Error::Cancelled => FailureKind::Cancelled,
            Error::AllStrategiesFailed { .. } => FailureKind::AllStrategiesFailed,
            Error::Codec { .. } => FailureKind::Codec,
            Error::Raster(_) => FailureKind::Raster,
            Error::Config(_) => FailureKind::Config,
            Error::Io { .. } => FailureKind::Io,
            Error::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether the orchestrator may recover by advancing to the next plan entry.
    ///
    /// `InvalidInput` and `Cancelled` short-circuit the whole plan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable { .. }
                | Error::Timeout { .. }
                | Error::Codec { .. }
                | Error::Raster(_)
                | Error::Internal(_)
        )
    }

    /// Convenience constructor for [`Error::BackendUnavailable`].
    pub fn unavailable(backend: impl fmt::Display, reason: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Timeout`].
    pub fn timeout(backend: impl fmt::Display, budget_ms: u64) -> Self {
        Error::Timeout {
            backend: backend.to_string(),
            budget_ms,
        }
    }

    /// Convenience constructor for [`Error::Codec`].
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
