//! Purger configuration
//!
//! These types are shared across crates: the binary loads them from its
//! config file, the core uses them to build connections and workers.

use purger_client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, PurgeClientConfig, PurgeTimeout,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connect/read timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: f64,
    #[serde(default = "default_read_secs")]
    pub read_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            read_secs: default_read_secs(),
        }
    }
}

impl TimeoutConfig {
    /// Check that both timeouts are finite and strictly positive
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("connect_secs", self.connect_secs), ("read_secs", self.read_secs)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!(
                    "timeout.{} must be a positive number of seconds, got {}",
                    name, value
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for the purge dispatcher and its connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgerConfig {
    /// Connect/read timeouts for each purge request
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Maximum pending requests per host (0 = unbounded)
    #[serde(default)]
    pub backlog: usize,
    /// Headers that may carry a proxy error message, checked in order
    #[serde(default = "default_error_headers")]
    pub error_headers: Vec<String>,
    /// Header carrying the proxy's cache status
    #[serde(default = "default_cache_header")]
    pub cache_header: String,
    /// HTTP method used when the caller does not name one
    #[serde(default = "default_http_verb")]
    pub http_verb: String,
    /// Do not warn when a host's queue is full.
    ///
    /// Useful in development, where proxies are often not running and the
    /// warning is expected noise.
    #[serde(default)]
    pub quiet_queue_full: bool,
    /// How long `stop(true)` waits for each worker, in milliseconds
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl PurgerConfig {
    /// Connection settings derived from this configuration
    pub fn client_config(&self) -> PurgeClientConfig {
        PurgeClientConfig {
            timeout: PurgeTimeout {
                connect: secs(self.timeout.connect_secs),
                read: secs(self.timeout.read_secs),
            },
            cache_header: self.cache_header.clone(),
            error_headers: self.error_headers.clone(),
            skip_tls_verify: self.skip_tls_verify,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for PurgerConfig {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            backlog: 0,
            error_headers: default_error_headers(),
            cache_header: default_cache_header(),
            http_verb: default_http_verb(),
            quiet_queue_full: false,
            stop_timeout_ms: default_stop_timeout_ms(),
            skip_tls_verify: false,
        }
    }
}

/// Loaders reject non-positive and non-finite timeouts; anything that
/// slips through falls back to zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn default_connect_secs() -> f64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_read_secs() -> f64 {
    DEFAULT_READ_TIMEOUT_SECS
}

fn default_error_headers() -> Vec<String> {
    vec!["x-squid-error".to_string()]
}

fn default_cache_header() -> String {
    "x-cache".to_string()
}

fn default_http_verb() -> String {
    "PURGE".to_string()
}

fn default_stop_timeout_ms() -> u64 {
    5000
}
