//! Error types for the lookup providers.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LookupError>;

/// Boxed error returned by collaborators such as [`ConfigSource`](crate::config::ConfigSource).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Names the service and action an error originated from, e.g. `qrz::session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Op {
    service: &'static str,
    action: &'static str,
}

impl Op {
    pub const fn new(service: &'static str, action: &'static str) -> Self {
        Self { service, action }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn action(&self) -> &'static str {
        self.action
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.service, self.action)
    }
}

/// Error type for all provider operations.
///
/// Cloneable so that a failed initialization can be handed to every caller
/// that races on, or later retries, [`Provider::initialize`](crate::Provider::initialize).
#[derive(Error, Debug, Clone)]
pub enum LookupError {
    /// A lookup was attempted before a successful `initialize`
    #[error("{op}: service is not initialized")]
    NotInitialized { op: Op },

    /// Missing collaborators or invalid configuration
    #[error("{op}: {message}")]
    Configuration {
        op: Op,
        message: String,
        #[source]
        source: Option<Arc<dyn StdError + Send + Sync>>,
    },

    /// Caller supplied an unusable identifier
    #[error("{op}: {message}")]
    InvalidArgument { op: Op, message: String },

    /// The upstream rejected the request, either with a non-2xx status or an
    /// in-band error message
    #[error("{op}: {}", upstream_detail(.status, .message))]
    Upstream {
        op: Op,
        status: Option<u16>,
        message: String,
    },

    /// The upstream explicitly reported that it has no data for the identifier
    #[error("{op}: not found: {message}")]
    NotFound { op: Op, message: String },

    /// The response body could not be parsed
    #[error("{op}: failed to decode response: {source}")]
    Decode {
        op: Op,
        #[source]
        source: DecodeError,
    },

    /// The request never produced a response
    #[error("{op}: request failed: {source}")]
    Transport {
        op: Op,
        #[source]
        source: TransportError,
    },

    /// The factory does not know the requested provider name
    #[error("unsupported lookup provider {name:?}")]
    UnsupportedProvider { name: String },
}

fn upstream_detail(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) if message.is_empty() => format!("upstream returned status {status}"),
        Some(status) => format!("upstream returned status {status}: {message}"),
        None => format!("upstream error: {message}"),
    }
}

/// Failure to parse a provider payload.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    #[error("invalid XML: {0}")]
    Xml(#[source] Arc<quick_xml::DeError>),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<quick_xml::DeError> for DecodeError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Xml(Arc::new(err))
    }
}

/// Failure below the HTTP status line: connect, TLS, timeout, or the caller
/// giving up through its [`LookupContext`](crate::LookupContext).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

impl TransportError {
    /// Whether this failure came from the network rather than the caller
    pub fn is_network(&self) -> bool {
        match self {
            TransportError::Http(err) => is_network_reqwest(err),
            TransportError::DeadlineExceeded => true,
            TransportError::Cancelled => false,
        }
    }
}

impl LookupError {
    /// Create a new configuration error
    pub fn configuration(op: Op, message: impl Into<String>) -> Self {
        Self::Configuration {
            op,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error caused by a collaborator failure
    pub fn configuration_with(op: Op, message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Configuration {
            op,
            message: message.into(),
            source: Some(Arc::from(source.into())),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(op: Op, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            message: message.into(),
        }
    }

    /// Create a new upstream error carrying an in-band provider message
    pub fn upstream(op: Op, message: impl Into<String>) -> Self {
        Self::Upstream {
            op,
            status: None,
            message: message.into(),
        }
    }

    /// Create a new upstream error for an unexpected HTTP status
    pub fn upstream_status(op: Op, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            op,
            status: Some(status),
            message: body.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found(op: Op, message: impl Into<String>) -> Self {
        Self::NotFound {
            op,
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(op: Op, source: impl Into<DecodeError>) -> Self {
        Self::Decode {
            op,
            source: source.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(op: Op, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            op,
            source: source.into(),
        }
    }

    /// The operation this error originated from, if any
    pub fn op(&self) -> Option<Op> {
        match self {
            LookupError::NotInitialized { op }
            | LookupError::Configuration { op, .. }
            | LookupError::InvalidArgument { op, .. }
            | LookupError::Upstream { op, .. }
            | LookupError::NotFound { op, .. }
            | LookupError::Decode { op, .. }
            | LookupError::Transport { op, .. } => Some(*op),
            LookupError::UnsupportedProvider { .. } => None,
        }
    }

    /// Check if the upstream reported that it has no data
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }

    /// Check if this error was caused by the network, which makes it a
    /// candidate for a caller-side retry
    pub fn is_network_error(&self) -> bool {
        is_network_error(self)
    }
}

/// Classify an arbitrary error as network related.
///
/// Walks the `source()` chain, so wrapper errors are classified by their
/// causes. True for reqwest connect/timeout/request failures (DNS failures
/// surface as connect errors), socket-level I/O errors, and an expired
/// [`LookupContext`](crate::LookupContext) deadline. Cancellation is not a
/// network error.
pub fn is_network_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(transport) = err.downcast_ref::<TransportError>() {
            if transport.is_network() {
                return true;
            }
        } else if let Some(http) = err.downcast_ref::<reqwest::Error>() {
            if is_network_reqwest(http) {
                return true;
            }
        } else if let Some(io) = err.downcast_ref::<io::Error>() {
            if is_network_io_kind(io.kind()) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn is_network_reqwest(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

fn is_network_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkDown
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: Op = Op::new("test", "lookup");

    #[derive(Debug, Error)]
    #[error("outer: {inner}")]
    struct Wrapper {
        #[source]
        inner: io::Error,
    }

    #[test]
    fn test_error_construction() {
        let error = LookupError::upstream_status(OP, 503, "maintenance");
        assert_eq!(
            error.to_string(),
            "test::lookup: upstream returned status 503: maintenance"
        );

        let error = LookupError::upstream(OP, "Invalid session key");
        assert!(error.to_string().contains("Invalid session key"));
        assert_eq!(error.op(), Some(OP));
        let op = error.op().unwrap();
        assert_eq!(op.service(), "test");
        assert_eq!(op.action(), "lookup");
        assert_eq!(op.to_string(), "test::lookup");

        let error = LookupError::UnsupportedProvider {
            name: "hamqth".to_string(),
        };
        assert!(error.to_string().contains("hamqth"));
        assert_eq!(error.op(), None);
    }

    #[test]
    fn test_configuration_keeps_source() {
        let cause = io::Error::new(io::ErrorKind::NotFound, "missing section");
        let error = LookupError::configuration_with(OP, "getting lookup service config", cause);
        let source = error.source().expect("configuration source");
        assert!(source.to_string().contains("missing section"));
    }

    #[test]
    fn test_error_properties() {
        assert!(LookupError::not_found(OP, "Not found: K1ABC").is_not_found());
        assert!(!LookupError::upstream(OP, "Not found: K1ABC").is_not_found());
        assert!(LookupError::transport(OP, TransportError::DeadlineExceeded).is_network_error());
        assert!(!LookupError::transport(OP, TransportError::Cancelled).is_network_error());
        assert!(!LookupError::invalid_argument(OP, "empty").is_network_error());
    }

    #[test]
    fn test_network_classification_of_io_errors() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(is_network_error(&refused));

        let unreachable = io::Error::from(io::ErrorKind::HostUnreachable);
        assert!(is_network_error(&unreachable));

        let plain = io::Error::other("x");
        assert!(!is_network_error(&plain));
    }

    #[test]
    fn test_network_classification_follows_sources() {
        let wrapped = Wrapper {
            inner: io::Error::from(io::ErrorKind::NetworkUnreachable),
        };
        assert!(is_network_error(&wrapped));

        let wrapped = Wrapper {
            inner: io::Error::from(io::ErrorKind::InvalidData),
        };
        assert!(!is_network_error(&wrapped));
    }
}
