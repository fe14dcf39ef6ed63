//! Connection traits
//!
//! A [`Connector`] opens sessions towards a caching proxy; a
//! [`PurgeConnection`] is one open session that purge requests are sent
//! through. Workers hold one connection for their whole lifetime, while
//! synchronous purges open a short-lived one per call.

use async_trait::async_trait;

use crate::client::{PurgeClient, PurgeClientConfig, PurgeResponse, open_session};
use crate::error::ProxyError;

/// An open session to a caching proxy
#[async_trait]
pub trait PurgeConnection: Send + Sync {
    /// Send one purge request for `url` using the HTTP method `verb`
    async fn purge(&self, url: &str, verb: &str) -> Result<PurgeResponse, ProxyError>;
}

/// Factory for purge connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection. `destination` is only used for diagnostics.
    async fn connect(&self, destination: &str) -> Result<Box<dyn PurgeConnection>, ProxyError>;
}

#[async_trait]
impl PurgeConnection for PurgeClient {
    async fn purge(&self, url: &str, verb: &str) -> Result<PurgeResponse, ProxyError> {
        PurgeClient::purge(self, url, verb).await
    }
}

/// Connector producing reqwest-backed [`PurgeClient`] sessions
#[derive(Clone, Debug, Default)]
pub struct HttpConnector {
    config: PurgeClientConfig,
}

impl HttpConnector {
    pub fn new(config: PurgeClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PurgeClientConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, destination: &str) -> Result<Box<dyn PurgeConnection>, ProxyError> {
        Ok(Box::new(open_session(&self.config, destination)?))
    }
}
