//! Cache purging settings
//!
//! Settings decide whether purging happens at all, which caching proxies
//! receive purges, and how virtual-hosted paths are rewritten. They are
//! read through a [`SettingsProvider`] so the embedding application can keep
//! them wherever it keeps the rest of its configuration.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePurgingSettings {
    /// Whether purging is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URLs of the caching proxies to purge, e.g. `http://localhost:6081`
    #[serde(default)]
    pub caching_proxies: Vec<String>,
    /// Domains the site is served under; used by virtual-host rewriting
    #[serde(default)]
    pub domains: Vec<String>,
    /// Whether the caching proxies sit in front of a virtual-hosting rewrite
    #[serde(default)]
    pub virtual_hosting: bool,
}

impl Default for CachePurgingSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            caching_proxies: Vec::new(),
            domains: Vec::new(),
            virtual_hosting: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Trait for providing cache purging settings
pub trait SettingsProvider: Send + Sync {
    /// Current settings
    fn settings(&self) -> CachePurgingSettings;

    /// Replace the settings
    fn update(&self, settings: CachePurgingSettings);
}

/// A simple in-memory implementation of SettingsProvider
#[derive(Clone, Default)]
pub struct InMemorySettingsProvider {
    settings: Arc<RwLock<CachePurgingSettings>>,
}

impl InMemorySettingsProvider {
    pub fn new(settings: CachePurgingSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
        }
    }
}

impl SettingsProvider for InMemorySettingsProvider {
    fn settings(&self) -> CachePurgingSettings {
        self.settings.read().clone()
    }

    fn update(&self, settings: CachePurgingSettings) {
        *self.settings.write() = settings;
    }
}

/// Whether purging is enabled; false when no settings are available
pub fn is_cache_purging_enabled(provider: Option<&dyn SettingsProvider>) -> bool {
    provider.is_some_and(|p| p.settings().enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_without_provider() {
        assert!(!is_cache_purging_enabled(None));
    }

    #[test]
    fn test_enabled_follows_settings() {
        let provider = InMemorySettingsProvider::new(CachePurgingSettings::default());
        assert!(is_cache_purging_enabled(Some(&provider)));

        provider.update(CachePurgingSettings {
            enabled: false,
            ..Default::default()
        });
        assert!(!is_cache_purging_enabled(Some(&provider)));
    }
}
