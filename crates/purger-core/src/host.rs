//! Purge requests and the destination key they are partitioned by

use serde::Serialize;
use std::fmt;
use url::Url;

use crate::error::CoreError;

/// A single queued purge: the URL to invalidate and the HTTP verb to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeRequest {
    pub url: String,
    pub verb: String,
}

impl PurgeRequest {
    pub fn new(url: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verb: verb.into(),
        }
    }
}

/// Identity of one caching-proxy destination.
///
/// Two URLs with the same scheme and network location (host plus any
/// explicit port) share one queue and one worker.
///
/// ```
/// use purger_core::HostKey;
///
/// let key = HostKey::from_url("http://Cache.Example.com:6081/front-page").unwrap();
/// assert_eq!(key.scheme(), "http");
/// assert_eq!(key.host(), "cache.example.com:6081");
/// assert_eq!(key.to_string(), "http://cache.example.com:6081");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HostKey {
    scheme: String,
    host: String,
}

impl HostKey {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_lowercase(),
            host: host.into().to_lowercase(),
        }
    }

    /// Derive the key from a URL string
    pub fn from_url(url: &str) -> Result<Self, CoreError> {
        let parsed = Url::parse(url).map_err(|e| CoreError::InvalidUrl(format!("{}: {}", url, e)))?;
        Self::try_from(&parsed)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host including the port, if the URL carried a non-default one
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = CoreError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        let host = url
            .host_str()
            .ok_or_else(|| CoreError::InvalidUrl(format!("{} has no host", url)))?;

        let netloc = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(HostKey::new(url.scheme(), netloc))
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}
