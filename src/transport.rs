//! HTTP plumbing shared by the adapters.

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::LookupConfig;
use crate::context::LookupContext;
use crate::error::{LookupError, Op, Result, TransportError};

pub(crate) const ACCEPT_JSON: &str = "application/json";
pub(crate) const ACCEPT_XML: &str = "application/xml";

/// Longest body excerpt carried by an upstream status error
const BODY_EXCERPT_LIMIT: usize = 512;

/// Build the HTTP client a provider uses for its whole lifetime
pub fn build_client(config: &LookupConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()
}

/// Status line and body of a completed exchange
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    /// Reject any status outside 2xx, keeping an excerpt of the body
    pub fn ensure_success(&self, op: Op) -> Result<()> {
        if self.status.is_success() {
            return Ok(());
        }
        Err(LookupError::upstream_status(
            op,
            self.status.as_u16(),
            excerpt(&self.body),
        ))
    }
}

/// Append `params` to the base URL's query, replacing parameters of the same
/// name that the base URL already carries
pub(crate) fn with_query(base: &str, params: &[(&str, &str)]) -> std::result::Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !params.iter().any(|(param, _)| *param == &**name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(params);
    Ok(url)
}

/// GET `url` and read the whole body, giving up when `ctx` ends
pub(crate) async fn get(
    client: &Client,
    ctx: &LookupContext,
    url: Url,
    user_agent: &str,
    accept: &str,
) -> std::result::Result<Reply, TransportError> {
    // The query carries credentials and session keys, so it is never logged
    debug!(
        host = url.host_str().unwrap_or_default(),
        path = url.path(),
        "sending lookup request"
    );

    let request = client
        .get(url)
        .header(USER_AGENT, user_agent)
        .header(ACCEPT, accept);

    let exchange = async move {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>(Reply { status, body })
    };

    let reply = ctx.run(exchange).await??;
    debug!(status = reply.status.as_u16(), bytes = reply.body.len(), "received lookup response");
    Ok(reply)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
