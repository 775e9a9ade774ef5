//! Logging collaborator handed to providers.
//!
//! Providers emit their request-level diagnostics through the ambient
//! `tracing` dispatcher. Operator-facing notices (a service being disabled, a
//! callsign missing from the database) go through the [`Logger`] the provider
//! was built with, so an application can route them to a dedicated subscriber.

use tracing::dispatcher::{self, Dispatch};
use tracing::Subscriber;

/// Handle to the `tracing` dispatcher a provider logs its notices to
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Capture the dispatcher that is current for the calling thread
    pub fn current() -> Self {
        Self {
            dispatch: dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Log to the given subscriber
    pub fn new<S>(subscriber: S) -> Self
    where
        S: Subscriber + Send + Sync + 'static,
    {
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Run `f` with this logger's dispatcher as the default
    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl From<Dispatch> for Logger {
    fn from(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }
}
