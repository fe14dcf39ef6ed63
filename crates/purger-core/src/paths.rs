//! Paths and URLs to purge
//!
//! Path providers describe what changed; the rewriter expands relative paths
//! (e.g. for virtual hosting); the caching proxy list turns each path into
//! one purge URL per proxy.

use tracing::debug;

use crate::dispatcher::PurgeDispatcher;
use crate::settings::CachePurgingSettings;

/// Source of paths to purge for one changed resource
pub trait PurgePaths {
    /// Paths relative to the site; these are passed through the rewriter
    fn relative_paths(&self) -> Vec<String>;

    /// Paths that are purged as-is
    fn absolute_paths(&self) -> Vec<String>;
}

/// Expands one path into the paths actually cached by the proxy
pub trait PathRewriter {
    fn rewrite(&self, path: &str) -> Vec<String>;
}

/// A fixed set of paths
#[derive(Debug, Clone, Default)]
pub struct StaticPaths {
    pub relative: Vec<String>,
    pub absolute: Vec<String>,
}

impl PurgePaths for StaticPaths {
    fn relative_paths(&self) -> Vec<String> {
        self.relative.clone()
    }

    fn absolute_paths(&self) -> Vec<String> {
        self.absolute.clone()
    }
}

/// Lazily yield every path to purge.
///
/// For each provider in turn: its relative paths, rewritten when a rewriter
/// is given, then its absolute paths unchanged.
pub fn paths_to_purge<'a>(
    providers: &'a [&'a dyn PurgePaths],
    rewriter: Option<&'a dyn PathRewriter>,
) -> impl Iterator<Item = String> + 'a {
    providers.iter().flat_map(move |provider| {
        let relative = provider
            .relative_paths()
            .into_iter()
            .flat_map(move |path| match rewriter {
                Some(rewriter) => rewriter.rewrite(&path),
                None => vec![path],
            });

        // Absolute paths are only asked for once the relative ones are consumed
        let absolute = std::iter::once_with(move || provider.absolute_paths()).flatten();

        relative.chain(absolute)
    })
}

/// Yield one full purge URL for `path` per caching proxy
pub fn urls_to_purge<'a>(path: &str, proxies: &'a [String]) -> impl Iterator<Item = String> + 'a {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    proxies.iter().map(move |proxy| {
        let proxy = proxy.strip_suffix('/').unwrap_or(proxy);
        format!("{}{}", proxy, path)
    })
}

/// Queue asynchronous purges of `paths` on every caching proxy.
///
/// Returns the URLs that were handed to the dispatcher; nothing is queued
/// when purging is disabled.
pub fn queue_purges(
    dispatcher: &PurgeDispatcher,
    settings: &CachePurgingSettings,
    paths: impl IntoIterator<Item = String>,
    verb: &str,
) -> Vec<String> {
    if !settings.enabled {
        debug!("Cache purging is disabled, nothing queued");
        return Vec::new();
    }

    let mut urls = Vec::new();
    for path in paths {
        for url in urls_to_purge(&path, &settings.caching_proxies) {
            dispatcher.purge_async(&url, verb);
            urls.push(url);
        }
    }

    debug!("Queued {} purge URLs", urls.len());
    urls
}
