//! # Callsign Lookup
//!
//! Async lookup providers for amateur-radio callsigns and prefixes.
//!
//! Two providers sit behind one lifecycle:
//!
//! - **HamNut** resolves a callsign prefix to its [`Country`] over a JSON API.
//! - **QRZ.com** resolves a full callsign to a [`ContactedStation`] over the
//!   XML API, logging in once during `initialize` and reusing the session key.
//!
//! Each provider is initialized once, concurrently safe, and can be disabled
//! in its configuration. A disabled provider never touches the network and
//! hands the identifier back in an otherwise empty record.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use callsign_lookup::{LookupConfig, Logger, Provider, ProviderFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut configs = HashMap::new();
//!     configs.insert(
//!         "qrz".to_string(),
//!         LookupConfig::enabled(callsign_lookup::qrz::DEFAULT_BASE_URL)
//!             .with_credentials("your_username", "your_password"),
//!     );
//!
//!     let factory = ProviderFactory::new(Logger::current(), Arc::new(configs));
//!     let qrz = factory.new_provider("qrz")?;
//!     qrz.initialize().await?;
//!
//!     let record = qrz.lookup("AA7BQ").await?;
//!     println!("{record:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`LookupError`] naming the operation it came from.
//! [`is_network_error`] tells transient network trouble apart from answers
//! the upstream actually gave.

pub mod config;
pub mod context;
pub mod error;
pub mod hamnut;
mod lifecycle;
pub mod logger;
pub mod provider;
pub mod qrz;
pub mod service;
pub mod transport;
pub mod types;

pub use config::{ConfigError, ConfigSource, LookupConfig};
pub use context::{CancelHandle, LookupContext};
pub use error::{is_network_error, LookupError, Op, Result};
pub use hamnut::HamNutProvider;
pub use logger::Logger;
pub use provider::{LookupProvider, Provider, ProviderFactory};
pub use qrz::QrzProvider;
pub use types::{ContactedStation, Country, LookupRecord};

/// Default user agent string for requests
pub const DEFAULT_USER_AGENT: &str = concat!("callsign-lookup/", env!("CARGO_PKG_VERSION"));

/// Default HTTP timeout, in seconds
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 30;
