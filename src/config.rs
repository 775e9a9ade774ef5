//! Lookup service configuration and the collaborator that supplies it.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::error::BoxError;
use crate::{DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT};

/// Configuration for a single lookup service
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// When false the provider never touches the network and lookups pass the
    /// identifier straight through
    pub enabled: bool,
    /// Base URL of the service endpoint
    pub url: String,
    /// User agent sent with every request (and as `agent` to QRZ)
    pub user_agent: String,
    /// Request timeout in seconds
    #[serde(alias = "http_timeout_sec")]
    pub http_timeout_seconds: i64,
    /// Account name, for services that require a session
    pub username: Option<String>,
    /// Account password, for services that require a session
    pub password: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for LookupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupConfig")
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .field("user_agent", &self.user_agent)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Reasons a [`LookupConfig`] is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lookup service URL cannot be empty")]
    EmptyUrl,

    #[error("lookup service URL is invalid: {url:?}")]
    InvalidUrl { url: String },

    #[error("lookup service user agent cannot be empty")]
    EmptyUserAgent,

    #[error("lookup service timeout must be greater than zero, got {0}")]
    NonPositiveTimeout(i64),
}

impl LookupConfig {
    /// Create an enabled configuration for the given endpoint
    pub fn enabled(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the account used by session-based services
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout_seconds(mut self, seconds: i64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    /// Trim and check the fields an enabled service depends on.
    ///
    /// A disabled configuration is accepted as-is.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        self.url = self.url.trim().to_string();
        if self.url.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        match Url::parse(&self.url) {
            Ok(url) if url.host_str().is_some_and(|host| !host.is_empty()) => {}
            _ => {
                return Err(ConfigError::InvalidUrl {
                    url: self.url.clone(),
                })
            }
        }

        self.user_agent = self.user_agent.trim().to_string();
        if self.user_agent.is_empty() {
            return Err(ConfigError::EmptyUserAgent);
        }

        if self.http_timeout_seconds <= 0 {
            return Err(ConfigError::NonPositiveTimeout(self.http_timeout_seconds));
        }

        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.http_timeout_seconds).unwrap_or(0))
    }

    /// Account name, empty when unset
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Account password, empty when unset
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }
}

/// Supplies per-service configuration to providers that were not handed a
/// [`LookupConfig`] directly
pub trait ConfigSource: Send + Sync {
    /// Configuration for the named lookup service (see [`crate::hamnut::SERVICE_NAME`]
    /// and [`crate::qrz::SERVICE_NAME`])
    fn lookup_service_config(&self, name: &str) -> Result<LookupConfig, BoxError>;
}

/// Returned by the map-backed [`ConfigSource`] for unknown services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no configuration for lookup service {0:?}")]
pub struct MissingServiceConfig(pub String);

impl ConfigSource for HashMap<String, LookupConfig> {
    fn lookup_service_config(&self, name: &str) -> Result<LookupConfig, BoxError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| MissingServiceConfig(name.to_string()).into())
    }
}
