//! HamNut prefix lookup.
//!
//! Resolves a callsign prefix to the [`Country`] it belongs to with a single
//! JSON GET. There is no session: `initialize` only validates the
//! configuration and builds the HTTP client.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use crate::config::LookupConfig;
use crate::context::LookupContext;
use crate::error::{LookupError, Op, Result};
use crate::service::{Adapter, Connection, Service};
use crate::transport::{self, ACCEPT_JSON};
use crate::types::Country;

/// Name the HamNut provider is registered and configured under
pub const SERVICE_NAME: &str = "hamnut";

/// Prefix lookup provider backed by HamNut
pub type HamNutProvider = Service<HamNut>;

/// HamNut JSON protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct HamNut;

#[async_trait]
impl Adapter for HamNut {
    type Record = Country;
    type Session = ();
    const NAME: &'static str = SERVICE_NAME;

    async fn open_session(&self, _client: &Client, _config: &LookupConfig) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, conn: Connection<'_, ()>, ctx: &LookupContext, prefix: &str) -> Result<Country> {
        let op = Op::new(SERVICE_NAME, "lookup");
        let url = transport::with_query(&conn.config.url, &[("prefix", prefix)])
            .map_err(|err| LookupError::configuration_with(op, "invalid HamNut base URL", err))?;

        debug!("Looking up prefix: {}", prefix);
        let reply = transport::get(conn.client, ctx, url, &conn.config.user_agent, ACCEPT_JSON)
            .await
            .map_err(|err| LookupError::transport(op, err))?;

        if reply.status == StatusCode::NOT_FOUND {
            return Err(LookupError::not_found(op, format!("prefix {prefix} not found")));
        }
        reply.ensure_success(op)?;

        let country = decode_country(op, &reply.body)?;
        info!("Successfully looked up prefix: {} - {}", prefix, country.name);
        Ok(country)
    }

    fn pass_through(prefix: &str) -> Country {
        Country {
            name: prefix.to_string(),
            ..Default::default()
        }
    }
}

/// Prefix lookup payload. Fields we do not map (`_t`, `status`) are ignored.
///
/// Every field is read as a raw value so that an unexpected type degrades to
/// a stringified or empty field instead of failing the lookup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrefixResponse {
    country_name: Option<Value>,
    prefix: Option<Value>,
    country_code: Option<Value>,
    continent: Option<Value>,
    cq_zone: Option<Value>,
    itu_zone: Option<Value>,
    #[serde(rename = "primaryDXCCPrefix")]
    primary_dxcc_prefix: Option<Value>,
    time_offset: Option<Value>,
    local_time: Option<Value>,
}

impl PrefixResponse {
    fn into_country(self) -> Country {
        Country {
            name: text(self.country_name.as_ref()),
            prefix: text(self.prefix.as_ref()),
            country_code: text(self.country_code.as_ref()),
            continent: text(self.continent.as_ref()),
            cq_zone: zone(self.cq_zone.as_ref()),
            itu_zone: zone(self.itu_zone.as_ref()),
            dxcc_prefix: text(self.primary_dxcc_prefix.as_ref()),
            time_offset: time_offset(
                &text(self.time_offset.as_ref()),
                &text(self.local_time.as_ref()),
            ),
        }
    }
}

fn decode_country(op: Op, body: &str) -> Result<Country> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        warn!("Failed to parse JSON response: {}", err);
        LookupError::decode(op, err)
    })?;

    // Checked on the raw payload so a miss is never reported as a decode error
    if value.get("found").and_then(Value::as_bool) == Some(false) {
        return Err(LookupError::not_found(op, "prefix not found"));
    }

    let response: PrefixResponse = serde_json::from_value(value).map_err(|err| {
        warn!("Unexpected JSON response shape: {}", err);
        LookupError::decode(op, err)
    })?;

    Ok(response.into_country())
}

/// Strings are copied, numbers are stringified, anything else is empty
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number_text(number),
        _ => String::new(),
    }
}

fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => (value as i64).to_string(),
        _ => number.to_string(),
    }
}

/// Zones are numeric upstream. Zero means unknown and maps to empty.
fn zone(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => String::new(),
        other => text(other),
    }
}

/// Prefer the explicit offset, then the offset of `localTime`. Empty
/// arguments count as absent.
fn time_offset(explicit: &str, local_time: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }

    let local_time = local_time.trim();
    match DateTime::parse_from_rfc3339(local_time) {
        Ok(timestamp) => format_offset(timestamp.offset().local_minus_utc()),
        // Not RFC 3339, assume the string ends in a `±HH:MM` suffix
        Err(_) => match local_time.char_indices().rev().nth(5) {
            Some((start, _)) => local_time[start..].to_string(),
            None => String::new(),
        },
    }
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
