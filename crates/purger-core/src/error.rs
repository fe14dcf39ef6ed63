//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Proxy error: {0}")]
    Proxy(#[from] purger_client::ProxyError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No async runtime available: {0}")]
    Runtime(String),
}
