//! Proxy error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid purge URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid HTTP verb: {0}")]
    InvalidVerb(String),

    #[error("Connection unavailable: {0}")]
    Unavailable(String),
}
