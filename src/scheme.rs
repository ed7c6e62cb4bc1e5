//! Host scheme resolution.
//!
//! The platform is reached over HTTPS or plain HTTP depending on the host.
//! Whichever scheme a host was first configured with is remembered in a
//! [`SchemeCache`] keyed by the bare host (no scheme, no path), so later
//! lookups by bare host need no scheme at all.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Hosts under this domain are assumed to be served over HTTPS.
pub const TRUSTED_SUFFIX: &str = "clarifai.com";

const HTTPS: &str = "https://";
const HTTP: &str = "http://";

/// Shared map of bare host to "is secure".
///
/// Cloning the handle shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct SchemeCache {
    inner: Arc<RwLock<HashMap<String, bool>>>,
}

static BASE_CACHE: OnceLock<SchemeCache> = OnceLock::new();
static UI_CACHE: OnceLock<SchemeCache> = OnceLock::new();

impl SchemeCache {
    /// An isolated cache, not shared with the process-wide ones.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache for API base hosts.
    pub fn global_base() -> Self {
        BASE_CACHE.get_or_init(SchemeCache::new).clone()
    }

    /// Process-wide cache for UI hosts.
    pub fn global_ui() -> Self {
        UI_CACHE.get_or_init(SchemeCache::new).clone()
    }

    /// Strips the scheme from `url`, records it against the bare host and
    /// returns the bare host.
    ///
    /// A URL without a scheme is accepted when its host is already cached or
    /// belongs to [`TRUSTED_SUFFIX`] (recorded as secure). Any other bare host
    /// is rejected rather than assumed insecure.
    pub fn resolve(&self, url: &str) -> Result<String> {
        let url = url.trim();
        let (rest, scheme) = if let Some(rest) = url.strip_prefix(HTTPS) {
            (rest, Some(true))
        } else if let Some(rest) = url.strip_prefix(HTTP) {
            (rest, Some(false))
        } else {
            (url, None)
        };

        let host = bare_host(rest);
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint(url.to_string()).into());
        }

        match scheme {
            Some(secure) => {
                debug!(host, secure, "recording host scheme");
                self.inner.write().insert(host.to_string(), secure);
            }
            None => {
                if self.is_secure(host).is_some() {
                    return Ok(host.to_string());
                }
                if !is_trusted(host) {
                    return Err(ConfigError::SchemeRequired(url.to_string()).into());
                }
                debug!(host, "trusted host, assuming https");
                self.inner.write().insert(host.to_string(), true);
            }
        }

        Ok(host.to_string())
    }

    /// `Some(true)` for HTTPS, `Some(false)` for HTTP, `None` if unresolved.
    pub fn is_secure(&self, host: &str) -> Option<bool> {
        self.inner.read().get(host).copied()
    }

    /// Scheme-qualified URL for a previously resolved host.
    pub fn url_for(&self, host: &str) -> Result<String> {
        match self.is_secure(host) {
            Some(true) => Ok(format!("{HTTPS}{host}")),
            Some(false) => Ok(format!("{HTTP}{host}")),
            None => Err(ConfigError::SchemeUnresolved(host.to_string()).into()),
        }
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Empties both process-wide caches.
pub fn clear_cache() {
    SchemeCache::global_base().clear();
    SchemeCache::global_ui().clear();
}

fn bare_host(rest: &str) -> &str {
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

// Hostnames compare case-insensitively.
fn is_trusted(host: &str) -> bool {
    let hostname = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    hostname == TRUSTED_SUFFIX || hostname.ends_with(&format!(".{TRUSTED_SUFFIX}"))
}
