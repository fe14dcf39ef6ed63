//! Virtual-host aware path rewriting
//!
//! When a site is served through a virtual-hosting rewrite, the proxy caches
//! pages under the rewritten internal URL, e.g.
//! `/VirtualHostBase/http/example.com/site/VirtualHostRoot/front-page`.
//! The rewriter turns a site-relative path into one such path per domain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::paths::PathRewriter;
use crate::settings::SettingsProvider;

/// Virtual-hosting details of the request that triggered the purge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualHostContext {
    /// The URL the client used; `None` when the request was not virtual hosted
    #[serde(default)]
    pub virtual_url: Option<String>,
    /// `[base_url, path]` or `[base_url, prefix, path]`
    #[serde(default)]
    pub virtual_url_parts: Vec<String>,
    /// Physical path of the virtual root, e.g. `["", "site"]`
    #[serde(default)]
    pub virtual_root_physical_path: Vec<String>,
}

/// Rewrites paths for every configured domain
pub struct VirtualHostRewriter {
    context: VirtualHostContext,
    settings: Option<Arc<dyn SettingsProvider>>,
}

impl VirtualHostRewriter {
    pub fn new(context: VirtualHostContext, settings: Option<Arc<dyn SettingsProvider>>) -> Self {
        Self { context, settings }
    }
}

impl PathRewriter for VirtualHostRewriter {
    fn rewrite(&self, path: &str) -> Vec<String> {
        let unchanged = || vec![path.to_string()];

        if self.context.virtual_url.is_none() {
            return unchanged();
        }

        let Some(provider) = &self.settings else {
            return unchanged();
        };
        let settings = provider.settings();

        if !settings.virtual_hosting {
            return unchanged();
        }

        let parts = &self.context.virtual_url_parts;
        let root_path = &self.context.virtual_root_physical_path;
        if parts.len() < 2 || parts.len() > 3 || root_path.is_empty() {
            return unchanged();
        }

        let domains = if settings.domains.is_empty() {
            vec![parts[0].clone()]
        } else {
            settings.domains
        };

        let mut root = root_path.join("/");
        if root == "/" {
            root.clear();
        }

        let prefix = if parts.len() == 3 && !parts[1].is_empty() {
            parts[1]
                .split('/')
                .map(|segment| format!("/_vh_{}", segment))
                .collect::<String>()
        } else {
            String::new()
        };

        let path = if !path.is_empty() && !path.starts_with('/') {
            format!("/{}", path)
        } else {
            path.to_string()
        };

        domains
            .iter()
            .filter_map(|domain| match split_domain(domain) {
                Some((scheme, host)) => Some(format!(
                    "/VirtualHostBase/{}/{}{}/VirtualHostRoot{}{}",
                    scheme, host, root, prefix, path
                )),
                None => {
                    warn!("Ignoring invalid purge domain: {}", domain);
                    None
                }
            })
            .collect()
    }
}

/// Split a domain URL into its scheme and authority.
///
/// Neither is normalised: an explicit default port and the host's case are
/// kept as written.
fn split_domain(domain: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = domain.split_once("://")?;
    let authority = rest
        .find(['/', '?', '#'])
        .map_or(rest, |end| &rest[..end]);

    if scheme.is_empty() || authority.is_empty() {
        return None;
    }
    Some((scheme, authority))
}
