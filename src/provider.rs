//! Provider abstraction and the factory that selects one by name.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigSource;
use crate::context::LookupContext;
use crate::error::{LookupError, Result};
use crate::hamnut::{self, HamNutProvider};
use crate::logger::Logger;
use crate::qrz::{self, QrzProvider};
use crate::service::{Adapter, Service, ServiceBuilder};
use crate::types::LookupRecord;

/// A lookup service that resolves identifiers to records
#[async_trait]
pub trait Provider: Send + Sync {
    type Record: Send;

    /// Name the provider is registered under
    fn name(&self) -> &'static str;

    /// Prepare the provider for lookups. Safe to call any number of times
    /// from any number of tasks; setup runs once.
    async fn initialize(&self) -> Result<()>;

    /// Look up an identifier without a deadline
    async fn lookup(&self, identifier: &str) -> Result<Self::Record> {
        self.lookup_with_context(&LookupContext::background(), identifier)
            .await
    }

    /// Look up an identifier, giving up when `ctx` ends
    async fn lookup_with_context(&self, ctx: &LookupContext, identifier: &str) -> Result<Self::Record>;
}

/// Any provider the [`ProviderFactory`] can build
pub enum LookupProvider {
    HamNut(HamNutProvider),
    Qrz(QrzProvider),
}

impl fmt::Debug for LookupProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LookupProvider").field(&self.name()).finish()
    }
}

#[async_trait]
impl Provider for LookupProvider {
    type Record = LookupRecord;

    fn name(&self) -> &'static str {
        match self {
            LookupProvider::HamNut(provider) => provider.name(),
            LookupProvider::Qrz(provider) => provider.name(),
        }
    }

    async fn initialize(&self) -> Result<()> {
        match self {
            LookupProvider::HamNut(provider) => provider.initialize().await,
            LookupProvider::Qrz(provider) => provider.initialize().await,
        }
    }

    async fn lookup_with_context(&self, ctx: &LookupContext, identifier: &str) -> Result<LookupRecord> {
        match self {
            LookupProvider::HamNut(provider) => provider
                .lookup_with_context(ctx, identifier)
                .await
                .map(LookupRecord::from),
            LookupProvider::Qrz(provider) => provider
                .lookup_with_context(ctx, identifier)
                .await
                .map(LookupRecord::from),
        }
    }
}

impl From<HamNutProvider> for LookupProvider {
    fn from(provider: HamNutProvider) -> Self {
        Self::HamNut(provider)
    }
}

impl From<QrzProvider> for LookupProvider {
    fn from(provider: QrzProvider) -> Self {
        Self::Qrz(provider)
    }
}

/// Builds providers by name, wiring in shared collaborators.
///
/// Providers are returned uninitialized. A factory built with [`Default`]
/// has no collaborators, so its providers fail `initialize` until built with
/// a logger and config source.
#[derive(Clone, Default)]
pub struct ProviderFactory {
    logger: Option<Logger>,
    config_source: Option<Arc<dyn ConfigSource>>,
}

impl ProviderFactory {
    pub fn new(logger: Logger, config_source: Arc<dyn ConfigSource>) -> Self {
        Self {
            logger: Some(logger),
            config_source: Some(config_source),
        }
    }

    /// Build the provider registered under `name`
    pub fn new_provider(&self, name: &str) -> Result<LookupProvider> {
        match name {
            hamnut::SERVICE_NAME => Ok(LookupProvider::HamNut(self.builder().build())),
            qrz::SERVICE_NAME => Ok(LookupProvider::Qrz(self.builder().build())),
            _ => Err(LookupError::UnsupportedProvider {
                name: name.to_string(),
            }),
        }
    }

    /// Build the provider registered under `name`.
    ///
    /// # Panics
    ///
    /// Panics if no provider is registered under `name`.
    pub fn must_provider(&self, name: &str) -> LookupProvider {
        match self.new_provider(name) {
            Ok(provider) => provider,
            Err(err) => panic!("{err}"),
        }
    }

    fn builder<A: Adapter + Default>(&self) -> ServiceBuilder<A> {
        let mut builder = Service::<A>::builder();
        if let Some(logger) = &self.logger {
            builder = builder.logger(logger.clone());
        }
        if let Some(config_source) = &self.config_source {
            builder = builder.config_source(config_source.clone());
        }
        builder
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("logger", &self.logger.is_some())
            .field("config_source", &self.config_source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LookupConfig;
    use std::collections::HashMap;

    fn factory() -> ProviderFactory {
        let mut configs = HashMap::new();
        configs.insert(hamnut::SERVICE_NAME.to_string(), LookupConfig::default());
        configs.insert(qrz::SERVICE_NAME.to_string(), LookupConfig::default());
        ProviderFactory::new(Logger::current(), Arc::new(configs))
    }

    #[test]
    fn test_new_provider_by_name() {
        let factory = factory();
        assert_eq!(factory.new_provider("hamnut").unwrap().name(), "hamnut");
        assert_eq!(factory.new_provider("qrz").unwrap().name(), "qrz");
    }

    #[test]
    fn test_new_provider_unknown_name() {
        let err = factory().new_provider("hamqth").unwrap_err();
        assert!(matches!(err, LookupError::UnsupportedProvider { ref name } if name == "hamqth"));
    }

    #[test]
    #[should_panic(expected = "unsupported lookup provider")]
    fn test_must_provider_panics_on_unknown_name() {
        factory().must_provider("QRZ");
    }

    #[tokio::test]
    async fn test_disabled_providers_pass_through() {
        let factory = factory();

        let hamnut = factory.must_provider(hamnut::SERVICE_NAME);
        hamnut.initialize().await.unwrap();
        let record = hamnut.lookup(" K1 ").await.unwrap();
        assert_eq!(record.as_country().map(|c| c.name.as_str()), Some("K1"));

        let qrz = factory.must_provider(qrz::SERVICE_NAME);
        qrz.initialize().await.unwrap();
        let record = qrz.lookup("aa7bq").await.unwrap();
        assert_eq!(record.as_station().map(|s| s.call.as_str()), Some("aa7bq"));
    }

    #[tokio::test]
    async fn test_default_factory_providers_need_a_logger() {
        let provider = ProviderFactory::default().must_provider("hamnut");
        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, LookupError::Configuration { .. }));
    }
}
