//! Off-thread execution with cancellation.

use tokio_util::sync::CancellationToken;
use wf_core::{Error, Result};

/// Logs when the awaiting side stops waiting before the task has finished.
struct Abandoned {
    settled: bool,
}

impl Drop for Abandoned {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!("blocking task abandoned; it keeps running in the background");
        }
    }
}

/// Run a blocking closure on the blocking pool and await its result.
///
/// Cancellation resolves immediately with [`Error::Cancelled`]; the closure
/// keeps running to completion in the background and its result is dropped.
/// The same holds when the returned future is dropped early, for example by
/// a timeout. A panic inside the closure becomes [`Error::Internal`].
pub async fn run_blocking<T, F>(cancel: &CancellationToken, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut watch = Abandoned { settled: false };
    let handle = tokio::task::spawn_blocking(task);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        joined = handle => {
            watch.settled = true;
            match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(Error::Internal("worker task panicked".into())),
                Err(e) => Err(Error::Internal(format!("worker task failed: {e}"))),
            }
        }
    }
}
