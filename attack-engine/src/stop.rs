//! One-shot cooperative stop signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Broadcast stop request shared by the scheduler, every worker and callers.
///
/// Only the first [`StopSignal::stop`] call wins; the rest report that a stop
/// is already under way.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    requested: AtomicBool,
    token: CancellationToken,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` for the call that flipped the signal
    /// and `false` for every call after it.
    pub fn stop(&self) -> bool {
        let first = self
            .inner
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.token.cancel();
        }
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }
}
