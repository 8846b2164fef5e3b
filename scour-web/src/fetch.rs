//! URL in, normalized document out.
//!
//! cache lookup → transport selection (plain GET or rendered page) →
//! extraction → cache write. Plain fetches are never retried here; a
//! failed cache write is logged and the fresh document is still returned.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use scour_config::FetchSettings;
use scour_drivers::BrowserPool;
use scour_http::{HttpClient, HttpError, RequestOpts};
use url::Url;

use crate::cache::FileCache;
use crate::error::FetchError;
use crate::extract::ExtractionDispatcher;
use crate::transport::{Route, TransportSelector};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

pub struct PageFetcher {
    http: HttpClient,
    pool: Arc<BrowserPool>,
    selector: TransportSelector,
    dispatcher: ExtractionDispatcher,
    cache: FileCache,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(
        pool: Arc<BrowserPool>,
        selector: TransportSelector,
        dispatcher: ExtractionDispatcher,
        cache: FileCache,
        settings: FetchSettings,
    ) -> Result<Self, HttpError> {
        let http = HttpClient::new("http://localhost/")?.with_retries(0);
        Ok(Self {
            http,
            pool,
            selector,
            dispatcher,
            cache,
            settings,
        })
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Fetch `url` and return the rendered document text.
    ///
    /// `timeout_ms` overrides the configured default and is clamped to the
    /// configured ceiling.
    pub async fn fetch(&self, url: &str, timeout_ms: Option<u64>) -> Result<String, FetchError> {
        let parsed = parse_target(url)?;

        if let Some(hit) = self.cache.read::<String>(url).await {
            tracing::info!(target: "web.fetch", url, "fetch.cache_hit");
            return Ok(hit);
        }

        let timeout = self.settings.effective_timeout(timeout_ms);
        let route = self.selector.classify(&parsed);
        tracing::info!(
            target: "web.fetch",
            url,
            browser = route.uses_browser,
            timeout_ms = timeout.as_millis() as u64,
            "fetch.start"
        );

        let html = self.retrieve(&parsed, &route, timeout).await?;
        let document = self.dispatcher.extract(&html, &parsed).render();

        if let Err(e) = self.cache.write(url, &document).await {
            tracing::warn!(target: "web.fetch", url, error = %e, "fetch.cache_write_failed");
        }
        Ok(document)
    }

    async fn retrieve(
        &self,
        url: &Url,
        route: &Route,
        timeout: std::time::Duration,
    ) -> Result<String, FetchError> {
        if route.uses_browser {
            let html = self
                .pool
                .render_page(url, timeout, route.wait_selector.as_deref())
                .await?;
            return Ok(html);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(ua) = HeaderValue::from_str(&self.settings.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        let response = self
            .http
            .get_text(
                url.as_str(),
                RequestOpts {
                    timeout: Some(timeout),
                    retries: Some(0),
                    headers: Some(headers),
                    allow_absolute: true,
                    expect_content_type: Some("text/html"),
                    ..Default::default()
                },
            )
            .await?;
        Ok(response.body)
    }
}

fn parse_target(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        "http" | "https" => Err(invalid("missing host".into())),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_web_urls_are_accepted() {
        assert!(parse_target("https://catalog.onliner.by/mobile").is_ok());
        assert!(matches!(
            parse_target("ftp://files.example/x"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_target("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
