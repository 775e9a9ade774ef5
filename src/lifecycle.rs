//! One-shot initialization gate shared by every provider.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio::sync::Mutex;

use crate::error::{LookupError, Result};

/// Where an instance is in its lifecycle
#[derive(Debug, Clone)]
enum Phase {
    Uninitialized,
    /// Setup is running, or a caller abandoned it part way
    Initializing,
    Ready,
    Failed(LookupError),
}

/// Result of running the setup body once
pub(crate) enum Outcome<T> {
    /// Setup succeeded
    Ready(T),
    /// Setup fell back to a usable state, but the caller still sees the error
    Degraded(T, LookupError),
    /// Setup failed and the instance stays unusable
    Failed(LookupError),
}

/// Runs setup exactly once and publishes its state for lock-free reads.
///
/// The phase token only changes under the mutex. The `ready` flag is set
/// after `state` and `degraded` are written, so a reader that observes it
/// sees both.
pub(crate) struct Lifecycle<T> {
    ready: AtomicBool,
    phase: Mutex<Phase>,
    state: OnceLock<T>,
    degraded: OnceLock<LookupError>,
}

impl<T> Lifecycle<T> {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            phase: Mutex::new(Phase::Uninitialized),
            state: OnceLock::new(),
            degraded: OnceLock::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// State published by a completed setup
    pub fn get(&self) -> Option<&T> {
        if self.is_ready() {
            self.state.get()
        } else {
            None
        }
    }

    /// Run `setup` unless an earlier call already settled the outcome, and
    /// report that outcome
    pub async fn initialize<F, Fut>(&self, setup: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        if self.is_ready() {
            return self.settled();
        }

        let mut phase = self.phase.lock().await;
        match &*phase {
            Phase::Ready => return self.settled(),
            Phase::Failed(err) => return Err(err.clone()),
            Phase::Uninitialized | Phase::Initializing => {}
        }

        *phase = Phase::Initializing;
        match setup().await {
            Outcome::Ready(state) => {
                self.publish(state);
                *phase = Phase::Ready;
                Ok(())
            }
            Outcome::Degraded(state, err) => {
                let _ = self.degraded.set(err.clone());
                self.publish(state);
                *phase = Phase::Ready;
                Err(err)
            }
            Outcome::Failed(err) => {
                *phase = Phase::Failed(err.clone());
                Err(err)
            }
        }
    }

    fn publish(&self, state: T) {
        // The phase lock is held and the phase is not Ready, so the cell is empty
        let _ = self.state.set(state);
        self.ready.store(true, Ordering::Release);
    }

    fn settled(&self) -> Result<()> {
        match self.degraded.get() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Op;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    const OP: Op = Op::new("test", "initialize");

    #[tokio::test]
    async fn test_setup_runs_once() {
        let lifecycle = Lifecycle::new();
        let runs = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = lifecycle
                .initialize(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Outcome::Ready(42)
                })
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.get(), Some(&42));
    }

    #[tokio::test]
    async fn test_failure_is_replayed() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new();

        let first = lifecycle
            .initialize(|| async { Outcome::Failed(LookupError::configuration(OP, "bad url")) })
            .await
            .unwrap_err();
        let second = lifecycle
            .initialize(|| async { Outcome::Ready(1) })
            .await
            .unwrap_err();

        assert_eq!(first.to_string(), second.to_string());
        assert!(!lifecycle.is_ready());
        assert!(lifecycle.get().is_none());
    }

    #[tokio::test]
    async fn test_degraded_state_is_usable_and_error_replayed() {
        let lifecycle = Lifecycle::new();

        let first = lifecycle
            .initialize(|| async { Outcome::Degraded("disabled", LookupError::upstream(OP, "bad password")) })
            .await;
        let second = lifecycle.initialize(|| async { Outcome::Ready("enabled") }).await;

        assert!(first.is_err());
        assert_eq!(first.unwrap_err().to_string(), second.unwrap_err().to_string());
        assert_eq!(lifecycle.get(), Some(&"disabled"));
    }

    #[tokio::test]
    async fn test_abandoned_setup_is_retried() {
        let lifecycle = Lifecycle::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            lifecycle.initialize(|| async {
                std::future::pending::<()>().await;
                Outcome::Ready(0)
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!lifecycle.is_ready());

        assert!(lifecycle.initialize(|| async { Outcome::Ready(7) }).await.is_ok());
        assert_eq!(lifecycle.get(), Some(&7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_setup() {
        let lifecycle = Arc::new(Lifecycle::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let lifecycle = lifecycle.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                lifecycle
                    .initialize(|| async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Outcome::Ready("ready")
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
