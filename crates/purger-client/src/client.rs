//! Caching proxy purge client

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, header::HeaderMap};
use tracing::{debug, info};

use crate::error::ProxyError;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 3.0;

/// Default read timeout in seconds
pub const DEFAULT_READ_TIMEOUT_SECS: f64 = 27.0;

/// Connect and read timeouts applied to every purge request
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PurgeTimeout {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for PurgeTimeout {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs_f64(DEFAULT_CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs_f64(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

/// Purge client configuration
#[derive(Clone, Debug)]
pub struct PurgeClientConfig {
    /// Connect/read timeouts
    pub timeout: PurgeTimeout,
    /// Header carrying the proxy's cache status (e.g. `x-cache`)
    pub cache_header: String,
    /// Ordered list of headers that may carry a proxy error message
    pub error_headers: Vec<String>,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl Default for PurgeClientConfig {
    fn default() -> Self {
        Self {
            timeout: PurgeTimeout::default(),
            cache_header: "x-cache".to_string(),
            error_headers: vec!["x-squid-error".to_string()],
            skip_tls_verify: false,
        }
    }
}

/// Result of a single purge request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurgeResponse {
    pub status: StatusCode,
    /// Value of the cache status header, empty if absent
    pub x_cache: String,
    /// First non-empty value among the configured error headers
    pub x_error: String,
}

/// HTTP client for purge requests.
///
/// One client is one session: its connection pool is reused for every
/// request made through it.
pub struct PurgeClient {
    config: PurgeClientConfig,
    client: Client,
}

impl PurgeClient {
    /// Create a new purge client
    pub fn new(config: PurgeClientConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeout.connect)
            .read_timeout(config.timeout.read);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        debug!(
            "Created purge client (connect timeout: {:?}, read timeout: {:?})",
            config.timeout.connect, config.timeout.read
        );

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &PurgeClientConfig {
        &self.config
    }

    /// Send a single purge request with the given verb
    pub async fn purge(&self, url: &str, verb: &str) -> Result<PurgeResponse, ProxyError> {
        let method = Method::from_bytes(verb.as_bytes())
            .map_err(|_| ProxyError::InvalidVerb(verb.to_string()))?;
        let target = reqwest::Url::parse(url)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Making {} request to {}", verb, url);

        let response = self.client.request(method, target).send().await?;
        let status = response.status();
        let headers = response.headers();

        let x_cache = header_value(headers, &self.config.cache_header);
        let x_error = first_error_header(headers, &self.config.error_headers);

        debug!(
            "{} of {}: {} {}",
            verb,
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );

        Ok(PurgeResponse {
            status,
            x_cache,
            x_error,
        })
    }
}

impl std::fmt::Debug for PurgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Read a header as a string, empty if absent or not valid UTF-8
fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Return the first present, non-empty header among `names`
fn first_error_header(headers: &HeaderMap, names: &[String]) -> String {
    names
        .iter()
        .map(|name| header_value(headers, name))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Build a client, logging the session creation for a destination
pub(crate) fn open_session(
    config: &PurgeClientConfig,
    destination: &str,
) -> Result<PurgeClient, ProxyError> {
    let client = PurgeClient::new(config.clone())?;
    info!("Opened purge session for {}", destination);
    Ok(client)
}
