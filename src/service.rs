//! Lifecycle wrapper shared by every lookup adapter.
//!
//! [`Service`] owns the collaborators, the one-shot initialization gate and
//! the short-circuits every provider applies before touching the network. An
//! [`Adapter`] only has to speak its upstream's protocol.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{ConfigSource, LookupConfig};
use crate::context::LookupContext;
use crate::error::{LookupError, Op, Result};
use crate::lifecycle::{Lifecycle, Outcome};
use crate::logger::Logger;
use crate::provider::Provider;
use crate::transport;

/// Protocol half of a provider
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Canonical record this adapter produces
    type Record: Send + 'static;

    /// State established once during initialization and reused by every lookup
    type Session: Send + Sync + 'static;

    /// Service name, also used to ask the [`ConfigSource`] for configuration
    const NAME: &'static str;

    /// Turn `NotFound` into a pass-through record instead of an error
    const PASS_THROUGH_NOT_FOUND: bool = false;

    /// Establish the session. Only called when the service is enabled.
    async fn open_session(&self, client: &Client, config: &LookupConfig) -> Result<Self::Session>;

    /// Resolve a trimmed, non-empty identifier
    async fn fetch(
        &self,
        conn: Connection<'_, Self::Session>,
        ctx: &LookupContext,
        identifier: &str,
    ) -> Result<Self::Record>;

    /// Record carrying nothing but the identifier
    fn pass_through(identifier: &str) -> Self::Record;
}

/// Everything an adapter needs to issue a request
pub struct Connection<'a, S> {
    pub client: &'a Client,
    pub config: &'a LookupConfig,
    pub session: &'a S,
}

/// State resolved by a completed initialization
struct Active<S> {
    config: LookupConfig,
    client: Option<Client>,
    session: Option<S>,
}

impl<S> Active<S> {
    fn disabled(config: LookupConfig) -> Self {
        Self {
            config,
            client: None,
            session: None,
        }
    }
}

/// A lookup provider: an [`Adapter`] behind the shared lifecycle
pub struct Service<A: Adapter> {
    adapter: A,
    logger: Option<Logger>,
    config_source: Option<Arc<dyn ConfigSource>>,
    config: Option<LookupConfig>,
    http_client: Option<Client>,
    lifecycle: Lifecycle<Active<A::Session>>,
}

impl<A: Adapter + Default> Service<A> {
    /// Start building a service
    pub fn builder() -> ServiceBuilder<A> {
        ServiceBuilder::new(A::default())
    }

    /// Create a service that asks `config_source` for its configuration
    pub fn new(logger: Logger, config_source: Arc<dyn ConfigSource>) -> Self {
        Self::builder().logger(logger).config_source(config_source).build()
    }

    /// Create a service with configuration supplied directly
    pub fn with_config(logger: Logger, config: LookupConfig) -> Self {
        Self::builder().logger(logger).config(config).build()
    }
}

impl<A: Adapter> Service<A> {
    /// Check if `initialize` has completed
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Check if the service will query its upstream. False before
    /// initialization and after a failed session setup.
    pub fn is_enabled(&self) -> bool {
        self.lifecycle.get().is_some_and(|active| active.config.enabled)
    }

    /// Resolve collaborators, validate the configuration and, when enabled,
    /// build the HTTP client and open the session.
    ///
    /// Runs its setup once per instance. Later and concurrent calls get the
    /// same result. A session failure disables the service: lookups then pass
    /// the identifier through, while this call keeps returning the error.
    pub async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize(|| self.setup()).await
    }

    /// Look up an identifier without a deadline
    pub async fn lookup(&self, identifier: &str) -> Result<A::Record> {
        self.lookup_with_context(&LookupContext::background(), identifier)
            .await
    }

    /// Look up an identifier, giving up when `ctx` ends
    pub async fn lookup_with_context(&self, ctx: &LookupContext, identifier: &str) -> Result<A::Record> {
        let op = Op::new(A::NAME, "lookup");
        let active = self
            .lifecycle
            .get()
            .ok_or(LookupError::NotInitialized { op })?;

        let identifier = identifier.trim();

        // The client is never built for a disabled service
        if !active.config.enabled {
            self.notice(|| debug!(service = A::NAME, "lookup service is disabled, passing identifier through"));
            return Ok(A::pass_through(identifier));
        }

        let (Some(client), Some(session)) = (&active.client, &active.session) else {
            return Err(LookupError::configuration(op, "http client is not configured"));
        };

        if identifier.is_empty() {
            return Err(LookupError::invalid_argument(op, "identifier cannot be empty"));
        }

        let conn = Connection {
            client,
            config: &active.config,
            session,
        };
        match self.adapter.fetch(conn, ctx, identifier).await {
            Err(err) if A::PASS_THROUGH_NOT_FOUND && err.is_not_found() => {
                self.notice(|| {
                    info!(
                        service = A::NAME,
                        identifier = identifier,
                        "not found upstream, returning identifier only"
                    )
                });
                Ok(A::pass_through(identifier))
            }
            result => result,
        }
    }

    async fn setup(&self) -> Outcome<Active<A::Session>> {
        let op = Op::new(A::NAME, "initialize");
        let (logger, mut config) = match self.resolve(op) {
            Ok(resolved) => resolved,
            Err(err) => return Outcome::Failed(err),
        };

        if !config.enabled {
            logger.in_scope(|| info!(service = A::NAME, "lookup service is disabled in the config"));
            return Outcome::Ready(Active::disabled(config));
        }

        let client = match &self.http_client {
            Some(client) => client.clone(),
            None => match transport::build_client(&config) {
                Ok(client) => client,
                Err(err) => return Outcome::Failed(LookupError::transport(op, err)),
            },
        };

        match self.adapter.open_session(&client, &config).await {
            Ok(session) => {
                debug!(service = A::NAME, "lookup service initialized");
                Outcome::Ready(Active {
                    config,
                    client: Some(client),
                    session: Some(session),
                })
            }
            Err(err) => {
                logger.in_scope(|| {
                    warn!(service = A::NAME, error = %err, "session setup failed, disabling lookup service")
                });
                config.enabled = false;
                Outcome::Degraded(Active::disabled(config), err)
            }
        }
    }

    fn resolve(&self, op: Op) -> Result<(&Logger, LookupConfig)> {
        let logger = self
            .logger
            .as_ref()
            .ok_or_else(|| LookupError::configuration(op, "logger has not been set"))?;

        let mut config = match (&self.config, &self.config_source) {
            (Some(config), _) => config.clone(),
            (None, Some(source)) => source.lookup_service_config(A::NAME).map_err(|err| {
                LookupError::configuration_with(op, "getting lookup service config", err)
            })?,
            (None, None) => {
                return Err(LookupError::configuration(
                    op,
                    "lookup service config has not been set",
                ))
            }
        };

        config
            .validate()
            .map_err(|err| LookupError::configuration_with(op, err.to_string(), err))?;

        Ok((logger, config))
    }

    fn notice(&self, f: impl FnOnce()) {
        if let Some(logger) = &self.logger {
            logger.in_scope(f);
        }
    }
}

#[async_trait]
impl<A: Adapter> Provider for Service<A> {
    type Record = A::Record;

    fn name(&self) -> &'static str {
        A::NAME
    }

    async fn initialize(&self) -> Result<()> {
        Service::initialize(self).await
    }

    async fn lookup_with_context(&self, ctx: &LookupContext, identifier: &str) -> Result<A::Record> {
        Service::lookup_with_context(self, ctx, identifier).await
    }
}

/// Builder for [`Service`]
pub struct ServiceBuilder<A: Adapter> {
    adapter: A,
    logger: Option<Logger>,
    config_source: Option<Arc<dyn ConfigSource>>,
    config: Option<LookupConfig>,
    http_client: Option<Client>,
}

impl<A: Adapter> ServiceBuilder<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            logger: None,
            config_source: None,
            config: None,
            http_client: None,
        }
    }

    /// Logger for operator notices. Required by `initialize`.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Where to fetch configuration when none is set directly
    pub fn config_source(mut self, config_source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(config_source);
        self
    }

    /// Configuration to use instead of asking the config source
    pub fn config(mut self, config: LookupConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// HTTP client to use instead of building one from the configuration
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Service<A> {
        Service {
            adapter: self.adapter,
            logger: self.logger,
            config_source: self.config_source,
            config: self.config,
            http_client: self.http_client,
            lifecycle: Lifecycle::new(),
        }
    }
}
