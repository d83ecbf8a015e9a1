//! Conversion events delivered to an optional caller-supplied callback.
//!
//! Progressive backends publish intermediate quality-ladder stages here; the
//! return value of an encode only ever carries the final stage.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::report::ConversionState;
use crate::types::BackendKind;

/// Something that happened during a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionEvent {
    StateChanged {
        state: ConversionState,
    },
    AttemptStarted {
        backend: BackendKind,
        position: usize,
    },
    AttemptFailed {
        backend: BackendKind,
        kind: FailureKind,
        reason: String,
    },
    /// A candidate was passed over because the time budget ran out.
    AttemptSkipped {
        backend: BackendKind,
    },
    /// An intermediate (or final) stage of a progressive encode.
    ProgressiveStage {
        backend: BackendKind,
        /// Zero-based stage index.
        stage: usize,
        stages: usize,
        quality: f32,
        bytes: usize,
    },
    Completed {
        backend: BackendKind,
        compressed_size: usize,
        total_time_ms: f64,
    },
}

/// Sender for conversion events.
///
/// Wraps a callback invoked synchronously on the emitting task, so callbacks
/// should be cheap.
pub struct EventSender {
    callback: Box<dyn Fn(&ConversionEvent) + Send + Sync>,
}

impl EventSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&ConversionEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all events.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Deliver an event.
    pub fn send(&self, event: ConversionEvent) {
        (self.callback)(&event);
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}
