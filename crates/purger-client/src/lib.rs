//! Cache Purger Proxy Client
//!
//! This crate provides the client that sends purge requests to caching
//! proxies and reports the status and cache headers they answer with.

pub mod client;
pub mod connector;
pub mod error;

pub use client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, PurgeClient, PurgeClientConfig,
    PurgeResponse, PurgeTimeout,
};
pub use connector::{Connector, HttpConnector, PurgeConnection};
pub use error::ProxyError;

pub use reqwest::StatusCode;
