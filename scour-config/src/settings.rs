//! Strongly typed configuration sections.
//!
//! Every field has a default so an empty document (or no document at all)
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScourConfig {
    pub browser: BrowserSettings,
    pub fetch: FetchSettings,
    pub cache: CacheSettings,
    pub search: SearchSettings,
    pub rate_limit: RateLimitSettings,
}

/// Browser process and rendering policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Capacity of the global gate (concurrently open pages).
    pub max_pages: usize,
    /// Explicit Chromium binary; discovery is used when unset.
    pub executable_path: Option<PathBuf>,
    /// Hosts that must be fetched through the browser.
    pub render_domains: Vec<String>,
    /// Hosts that get their own capacity-1 gate.
    pub serialize_domains: Vec<String>,
    /// Host -> CSS selector awaited after navigation on listing pages.
    pub wait_selectors: BTreeMap<String, String>,
    pub wait_selector_timeout_ms: u64,
    pub launch_args: Vec<String>,
    /// Locale advertised by rendered pages (`Accept-Language`).
    pub locale: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            max_pages: 4,
            executable_path: None,
            render_domains: vec!["cars.av.by".into(), "www.kufar.by".into()],
            serialize_domains: vec!["cars.av.by".into()],
            wait_selectors: BTreeMap::from([
                ("cars.av.by".to_string(), ".listing".to_string()),
                ("www.kufar.by".to_string(), "a[href*=\"/item/\"]".to_string()),
            ]),
            wait_selector_timeout_ms: 5_000,
            launch_args: vec![
                "--no-sandbox".into(),
                "--disable-setuid-sandbox".into(),
                "--disable-dev-shm-usage".into(),
                "--disable-gpu".into(),
                "--disable-extensions".into(),
            ],
            locale: "ru-BY".into(),
        }
    }
}

impl BrowserSettings {
    pub fn wait_selector_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_selector_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_ms: u64,
    /// Upper bound applied to caller-supplied timeout overrides.
    pub max_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_timeout_ms: 120_000,
            user_agent: "scour/0.1 (+content-acquisition)".into(),
        }
    }
}

impl FetchSettings {
    /// Resolve a caller override against the default and the ceiling.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.timeout_ms)
            .clamp(1, self.max_timeout_ms.max(1));
        Duration::from_millis(ms)
    }
}

/// Location and lifetime of one file-backed cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInstanceSettings {
    /// Overrides `<root>/<default name>` when set.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
}

impl CacheInstanceSettings {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            dir: None,
            ttl_secs,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub root: PathBuf,
    pub page: CacheInstanceSettings,
    pub reference: CacheInstanceSettings,
    pub listing: CacheInstanceSettings,
    pub detail: CacheInstanceSettings,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".cache"),
            page: CacheInstanceSettings::new(10 * 60),
            reference: CacheInstanceSettings::new(30 * 24 * 60 * 60),
            listing: CacheInstanceSettings::new(10 * 60),
            detail: CacheInstanceSettings::new(60 * 60),
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl CacheSettings {
    /// Directory for an instance: explicit override or `<root>/<name>`.
    pub fn dir_for(&self, instance: &CacheInstanceSettings, name: &str) -> PathBuf {
        instance
            .dir
            .clone()
            .unwrap_or_else(|| self.root.join(name))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Search aggregation backend (SearXNG-compatible JSON API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub url: String,
    pub engines: String,
    pub categories: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: u64,
    pub retries: usize,
    pub backoff_ms: u64,
    pub default_region: String,
    pub max_batch_queries: usize,
    pub max_results: usize,
    pub default_results: usize,
    pub max_query_length: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            url: "http://searxng:8080".into(),
            engines: "google,yandex".into(),
            categories: "general".into(),
            username: None,
            password: None,
            timeout_ms: 12_000,
            retries: 2,
            backoff_ms: 350,
            default_region: "ru-by".into(),
            max_batch_queries: 8,
            max_results: 20,
            default_results: 10,
            max_query_length: 400,
        }
    }
}

impl SearchSettings {
    /// Basic-auth credentials, only when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub per_second: u64,
    pub per_month: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_second: 20,
            per_month: 15_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_override_is_clamped() {
        let fetch = FetchSettings::default();
        assert_eq!(fetch.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(
            fetch.effective_timeout(Some(5_000)),
            Duration::from_secs(5)
        );
        assert_eq!(
            fetch.effective_timeout(Some(10_000_000)),
            Duration::from_millis(fetch.max_timeout_ms)
        );
    }

    #[test]
    fn cache_dirs_default_under_root() {
        let cache = CacheSettings::default();
        assert_eq!(
            cache.dir_for(&cache.page, "fetch"),
            PathBuf::from(".cache/fetch")
        );

        let mut detail = cache.detail.clone();
        detail.dir = Some(PathBuf::from("/var/cache/detail"));
        assert_eq!(
            cache.dir_for(&detail, "detail"),
            PathBuf::from("/var/cache/detail")
        );
    }

    #[test]
    fn credentials_need_both_halves() {
        let mut search = SearchSettings::default();
        assert!(search.credentials().is_none());
        search.username = Some("svc".into());
        assert!(search.credentials().is_none());
        search.password = Some("hunter2".into());
        assert_eq!(search.credentials(), Some(("svc", "hunter2")));
    }
}
