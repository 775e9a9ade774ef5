//! Per-call cancellation and deadlines.

use std::future::{pending, Future};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

use crate::error::TransportError;

/// Cancellation scope for a single lookup.
///
/// The default context is unbounded: no deadline and nothing can cancel it.
/// The HTTP client's own timeout still applies, and whichever of the two
/// fires first ends the request.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    deadline: Option<Instant>,
    cancel: Option<CancelHandle>,
}

impl LookupContext {
    /// Unbounded context
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Context that ends when `handle` is cancelled
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context is already done
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.cancel.as_ref().is_some_and(CancelHandle::is_cancelled) {
            return Err(TransportError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(TransportError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it completes or the context ends, whichever is first
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Result<F::Output, TransportError> {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(handle) => handle.cancelled().await,
                None => pending().await,
            }
        };

        tokio::select! {
            output = fut => Ok(output),
            _ = cancelled => Err(TransportError::Cancelled),
            _ = deadline => Err(TransportError::DeadlineExceeded),
        }
    }
}

/// Cancels every [`LookupContext`] it was attached to
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
