//! QRZ.com XML callsign lookup.
//!
//! `initialize` logs in with the configured credentials and keeps the issued
//! session key for every later lookup. A callsign QRZ.com does not know
//! resolves to a [`ContactedStation`] carrying only the callsign.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::LookupConfig;
use crate::context::LookupContext;
use crate::error::{LookupError, Op, Result};
use crate::service::{Adapter, Connection, Service};
use crate::transport::{self, ACCEPT_XML};
use crate::types::ContactedStation;

/// Name the QRZ provider is registered and configured under
pub const SERVICE_NAME: &str = "qrz";

/// Default base URL for the QRZ XML API
pub const DEFAULT_BASE_URL: &str = "https://xmldata.qrz.com/xml/current/";

/// Callsign lookup provider backed by QRZ.com
pub type QrzProvider = Service<Qrz>;

/// QRZ.com XML protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct Qrz;

/// Session key issued by QRZ.com at login
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

#[async_trait]
impl Adapter for Qrz {
    type Record = ContactedStation;
    type Session = SessionKey;
    const NAME: &'static str = SERVICE_NAME;
    const PASS_THROUGH_NOT_FOUND: bool = true;

    async fn open_session(&self, client: &Client, config: &LookupConfig) -> Result<SessionKey> {
        let op = Op::new(SERVICE_NAME, "session");
        let url = transport::with_query(
            &config.url,
            &[
                ("username", config.username()),
                ("password", config.password()),
                ("agent", config.user_agent.as_str()),
            ],
        )
        .map_err(|err| LookupError::configuration_with(op, "invalid QRZ base URL", err))?;

        debug!("Performing login to QRZ.com");
        let reply = transport::get(
            client,
            &LookupContext::background(),
            url,
            &config.user_agent,
            ACCEPT_XML,
        )
        .await
        .map_err(|err| LookupError::transport(op, err))?;
        reply.ensure_success(op)?;

        let session = parse(op, &reply.body)?.session;
        if let Some(error) = session.error() {
            return Err(LookupError::upstream(op, error));
        }
        let key = session
            .key()
            .ok_or_else(|| LookupError::upstream(op, "missing session key"))?;

        if let Some(message) = session.message() {
            info!("QRZ.com session message: {}", message);
        }
        debug!(
            count = session.count.as_deref().unwrap_or_default(),
            expires = session.sub_exp.as_deref().unwrap_or_default(),
            "QRZ.com session established"
        );
        info!("Successfully authenticated with QRZ.com");
        Ok(SessionKey(key.to_string()))
    }

    async fn fetch(
        &self,
        conn: Connection<'_, SessionKey>,
        ctx: &LookupContext,
        callsign: &str,
    ) -> Result<ContactedStation> {
        let op = Op::new(SERVICE_NAME, "lookup");
        let url = transport::with_query(
            &conn.config.url,
            &[
                ("s", conn.session.as_str()),
                ("callsign", callsign),
                ("agent", conn.config.user_agent.as_str()),
            ],
        )
        .map_err(|err| LookupError::configuration_with(op, "invalid QRZ base URL", err))?;

        debug!("Looking up callsign: {}", callsign);
        let reply = transport::get(conn.client, ctx, url, &conn.config.user_agent, ACCEPT_XML)
            .await
            .map_err(|err| LookupError::transport(op, err))?;
        reply.ensure_success(op)?;

        let station = decode_station(op, &reply.body)?;
        info!("Successfully looked up callsign: {}", station.call);
        Ok(station)
    }

    fn pass_through(callsign: &str) -> ContactedStation {
        ContactedStation {
            call: callsign.to_string(),
            ..Default::default()
        }
    }
}

/// Root element of every QRZ XML response
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "QRZDatabase")]
struct QrzDatabase {
    #[serde(rename = "Session", default)]
    session: SessionInfo,

    #[serde(rename = "Callsign")]
    callsign: Option<CallsignInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionInfo {
    #[serde(rename = "Key")]
    key: Option<String>,

    /// Lookups made in the current 24h window
    #[serde(rename = "Count")]
    count: Option<String>,

    /// Subscription expiry date
    #[serde(rename = "SubExp")]
    sub_exp: Option<String>,

    #[serde(rename = "Message")]
    message: Option<String>,

    #[serde(rename = "Error")]
    error: Option<String>,
}

impl SessionInfo {
    fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }

    fn message(&self) -> Option<&str> {
        non_empty(&self.message)
    }
}

/// The `<Callsign>` fields a [`ContactedStation`] is built from. Everything
/// stays textual: QRZ.com leaves fields out rather than sending zero values.
#[derive(Debug, Default, Deserialize)]
struct CallsignInfo {
    call: Option<String>,
    fname: Option<String>,
    name: Option<String>,
    name_fmt: Option<String>,
    nickname: Option<String>,
    addr1: Option<String>,
    /// City
    addr2: Option<String>,
    state: Option<String>,
    zip: Option<String>,
    country: Option<String>,
    grid: Option<String>,
    cqzone: Option<String>,
    ituzone: Option<String>,
    dxcc: Option<String>,
    email: Option<String>,
    /// Previous callsign
    p_call: Option<String>,
    url: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
    attn: Option<String>,
}

impl CallsignInfo {
    /// Formatted name, else first and last name, else the nickname
    fn display_name(&self) -> String {
        if let Some(formatted) = non_empty(&self.name_fmt) {
            return formatted.to_string();
        }

        let full = [&self.fname, &self.name]
            .into_iter()
            .filter_map(non_empty)
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }

        trimmed(&self.nickname).to_string()
    }

    fn qth(&self) -> String {
        join_non_empty([trimmed(&self.addr2), trimmed(&self.state)])
    }

    fn into_station(self, call: String) -> ContactedStation {
        let qth = self.qth();
        ContactedStation {
            name: self.display_name(),
            address: join_non_empty([
                trimmed(&self.addr1),
                qth.as_str(),
                trimmed(&self.zip),
                trimmed(&self.country),
            ]),
            country: trimmed(&self.country).to_string(),
            gridsquare: trimmed(&self.grid).to_uppercase(),
            cq_zone: trimmed(&self.cqzone).to_string(),
            itu_zone: trimmed(&self.ituzone).to_string(),
            dxcc: trimmed(&self.dxcc).to_string(),
            email: trimmed(&self.email).to_string(),
            equivalent_call: trimmed(&self.p_call).to_uppercase(),
            web_url: trimmed(&self.url).to_string(),
            latitude: trimmed(&self.lat).to_string(),
            longitude: trimmed(&self.lon).to_string(),
            contacted_operator: trimmed(&self.attn).to_string(),
            qth,
            call,
        }
    }
}

fn parse(op: Op, body: &str) -> Result<QrzDatabase> {
    quick_xml::de::from_str(body).map_err(|err| {
        warn!("Failed to parse XML response: {}", err);
        LookupError::decode(op, err)
    })
}

/// Map a lookup response to a station, surfacing in-band session errors
fn decode_station(op: Op, body: &str) -> Result<ContactedStation> {
    let response = parse(op, body)?;

    if let Some(error) = response.session.error() {
        if error.to_lowercase().contains("not found") {
            return Err(LookupError::not_found(op, error));
        }
        return Err(LookupError::upstream(op, error));
    }

    let info = response.callsign.unwrap_or_default();
    let call = trimmed(&info.call).to_uppercase();
    if call.is_empty() {
        return Err(LookupError::not_found(op, "callsign not present in response"));
    }

    Ok(info.into_station(call))
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    Some(trimmed(value)).filter(|value| !value.is_empty())
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: Op = Op::new(SERVICE_NAME, "lookup");

    const AA7BQ_XML: &str = r#"<?xml version="1.0"?>
<QRZDatabase version="1.34">
  <Callsign>
    <call>aa7bq</call>
    <fname>FRED L</fname>
    <name>LLOYD</name>
    <addr1>8711 E PINNACLE PEAK RD 193</addr1>
    <addr2>SCOTTSDALE</addr2>
    <state>AZ</state>
    <zip>85255</zip>
    <country>United States</country>
    <grid>DM32af</grid>
    <cqzone>3</cqzone>
    <ituzone>2</ituzone>
    <dxcc>291</dxcc>
    <email>flloyd@qrz.com</email>
    <p_call>KJ6RK</p_call>
    <url>https://www.qrz.com/db/aa7bq</url>
    <lat>34.23456</lat>
    <lon>-112.34356</lon>
    <attn>c/o QRZ LLC</attn>
    <name_fmt>FRED "The Boss" LLOYD</name_fmt>
  </Callsign>
  <Session></Session>
</QRZDatabase>"#;

    fn base_info() -> CallsignInfo {
        CallsignInfo {
            call: Some("k1abc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_station() {
        let station = decode_station(OP, AA7BQ_XML).unwrap();
        assert_eq!(
            station,
            ContactedStation {
                call: "AA7BQ".to_string(),
                name: "FRED \"The Boss\" LLOYD".to_string(),
                address: "8711 E PINNACLE PEAK RD 193, SCOTTSDALE, AZ, 85255, United States".to_string(),
                qth: "SCOTTSDALE, AZ".to_string(),
                country: "United States".to_string(),
                gridsquare: "DM32AF".to_string(),
                cq_zone: "3".to_string(),
                itu_zone: "2".to_string(),
                dxcc: "291".to_string(),
                email: "flloyd@qrz.com".to_string(),
                equivalent_call: "KJ6RK".to_string(),
                web_url: "https://www.qrz.com/db/aa7bq".to_string(),
                latitude: "34.23456".to_string(),
                longitude: "-112.34356".to_string(),
                contacted_operator: "c/o QRZ LLC".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_session_error_is_upstream() {
        let xml = r#"<?xml version="1.0"?>
<QRZDatabase version="1.34">
  <Callsign></Callsign>
  <Session><Error>Invalid session key</Error></Session>
</QRZDatabase>"#;

        match decode_station(OP, xml).unwrap_err() {
            LookupError::Upstream { status, message, .. } => {
                assert_eq!(status, None);
                assert_eq!(message, "Invalid session key");
            }
            other => panic!("Expected Upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_not_found() {
        let xml = r#"<?xml version="1.0"?>
<QRZDatabase version="1.34">
  <Callsign></Callsign>
  <Session><Error>Callsign NOT FOUND: xx1xx</Error></Session>
</QRZDatabase>"#;

        let err = decode_station(OP, xml).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Callsign NOT FOUND: xx1xx"));
    }

    #[test]
    fn test_decode_requires_call() {
        let xml = r#"<?xml version="1.0"?>
<QRZDatabase version="1.34">
  <Callsign>
    <name>LLOYD</name>
  </Callsign>
  <Session></Session>
</QRZDatabase>"#;

        let err = decode_station(OP, xml).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("callsign not present in response"));
    }

    #[test]
    fn test_decode_malformed_xml() {
        let err = decode_station(OP, "<QRZDatabase><Callsign>").unwrap_err();
        assert!(matches!(err, LookupError::Decode { .. }));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut info = CallsignInfo {
            fname: Some(" John ".to_string()),
            name: Some("Doe".to_string()),
            nickname: Some("JD".to_string()),
            ..base_info()
        };
        assert_eq!(info.display_name(), "John Doe");

        info.fname = None;
        assert_eq!(info.display_name(), "Doe");

        info.name = Some("  ".to_string());
        assert_eq!(info.display_name(), "JD");

        info.name_fmt = Some("Johnny D".to_string());
        assert_eq!(info.display_name(), "Johnny D");
    }

    #[test]
    fn test_address_skips_empty_parts() {
        let station = CallsignInfo {
            addr1: Some("1 Main St".to_string()),
            state: Some("CT".to_string()),
            country: Some("United States".to_string()),
            ..base_info()
        }
        .into_station("K1ABC".to_string());

        assert_eq!(station.address, "1 Main St, CT, United States");
        assert_eq!(station.qth, "CT");
        assert!(station.name.is_empty());
    }

    #[test]
    fn test_session_info_helpers() {
        let session = SessionInfo {
            key: Some(" 2331uf894c4bd29f3923f3bacf02c532d7bd9 ".to_string()),
            error: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(session.key(), Some("2331uf894c4bd29f3923f3bacf02c532d7bd9"));
        assert_eq!(session.error(), None);
        assert_eq!(session.message(), None);
    }

    #[test]
    fn test_session_key_is_redacted() {
        let key = SessionKey("2331uf894c4bd29f3923f3bacf02c532d7bd9".to_string());
        assert_eq!(format!("{key:?}"), "SessionKey(<redacted>)");
        assert_eq!(key.as_str(), "2331uf894c4bd29f3923f3bacf02c532d7bd9");
    }
}
