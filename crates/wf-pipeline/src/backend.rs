//! The [`EncoderBackend`] trait defines a single encoding strategy.

use async_trait::async_trait;
use wf_core::{BackendKind, EncodeOptions, EncodedResult, ImageBuffer, Result};

use crate::context::EncodeContext;

/// One way of turning pixels into WebP bytes.
///
/// An encode either returns a complete [`EncodedResult`] or an error; there
/// is no partial success. Backends own the image they are given and may
/// mutate it freely.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// The strategy this backend implements.
    fn kind(&self) -> BackendKind;

    /// Encode `image` with `options`.
    ///
    /// # Errors
    ///
    /// - [`Error::BackendUnavailable`](wf_core::Error::BackendUnavailable)
    ///   when a capability assumed at selection time is gone.
    /// - [`Error::Timeout`](wf_core::Error::Timeout) when the backend runs
    ///   past `options.time_budget_ms`.
    /// - [`Error::Cancelled`](wf_core::Error::Cancelled) when `ctx` is
    ///   cancelled.
    /// - [`Error::InvalidInput`](wf_core::Error::InvalidInput) for malformed
    ///   input.
    async fn encode(
        &self,
        image: ImageBuffer,
        options: &EncodeOptions,
        ctx: &EncodeContext,
    ) -> Result<EncodedResult>;
}
