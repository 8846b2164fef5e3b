use std::collections::{BTreeMap, HashSet};

use scour_config::BrowserSettings;
use url::Url;

/// Where a URL should be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub uses_browser: bool,
    /// Readiness selector awaited after navigation; only set for browser routes.
    pub wait_selector: Option<String>,
}

/// Picks plain HTTP or the rendering browser per host.
#[derive(Debug, Clone)]
pub struct TransportSelector {
    render_domains: HashSet<String>,
    wait_selectors: BTreeMap<String, String>,
}

impl TransportSelector {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            render_domains: settings
                .render_domains
                .iter()
                .map(|d| normalize_host(d))
                .filter(|d| !d.is_empty())
                .collect(),
            wait_selectors: settings
                .wait_selectors
                .iter()
                .map(|(host, sel)| (normalize_host(host), sel.clone()))
                .collect(),
        }
    }

    pub fn classify(&self, url: &Url) -> Route {
        let host = url.host_str().map(normalize_host).unwrap_or_default();
        if !self.render_domains.contains(&host) {
            return Route {
                uses_browser: false,
                wait_selector: None,
            };
        }
        Route {
            uses_browser: true,
            wait_selector: self.wait_selectors.get(&host).cloned(),
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(url: &str) -> Route {
        TransportSelector::new(&BrowserSettings::default()).classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn configured_hosts_render_with_their_selector() {
        let route = classify("https://cars.av.by/filter?brands[0][brand]=6");
        assert!(route.uses_browser);
        assert_eq!(route.wait_selector.as_deref(), Some(".listing"));

        let route = classify("https://WWW.KUFAR.BY/l/mebel");
        assert!(route.uses_browser);
        assert_eq!(route.wait_selector.as_deref(), Some("a[href*=\"/item/\"]"));
    }

    #[test]
    fn everything_else_is_plain_http() {
        assert_eq!(
            classify("https://catalog.onliner.by/mobile"),
            Route {
                uses_browser: false,
                wait_selector: None
            }
        );
        assert!(!classify("https://kufar.by/").uses_browser);
    }

    #[test]
    fn render_host_without_selector() {
        let settings = BrowserSettings {
            render_domains: vec!["spa.example".into()],
            ..BrowserSettings::default()
        };
        let route = TransportSelector::new(&settings).classify(&Url::parse("https://spa.example/").unwrap());
        assert!(route.uses_browser);
        assert_eq!(route.wait_selector, None);
    }
}
