//! Execution context shared by the orchestrator and every backend attempt.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wf_core::events::{ConversionEvent, EventSender};
use wf_core::{Error, Result};

/// Context passed to every backend during a conversion.
#[derive(Debug, Clone)]
pub struct EncodeContext {
    /// Cancelling aborts the running attempt and ends the conversion.
    pub cancellation: CancellationToken,
    /// Channel for conversion events, including progressive stages.
    pub events: Arc<EventSender>,
}

impl EncodeContext {
    /// Create a context with a fresh token and no event listener.
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            events: Arc::new(EventSender::noop()),
        }
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: attach an event sender.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Fail with [`Error::Cancelled`] if the token has fired.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn emit(&self, event: ConversionEvent) {
        self.events.send(event);
    }
}

impl Default for EncodeContext {
    fn default() -> Self {
        Self::new()
    }
}
