use std::borrow::Cow;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use scour_config::SearchSettings;
use scour_http::{Auth, HttpClient, HttpError, RequestOpts};

use super::region::{SafeSearch, language_for};
use super::types::{SearchHit, SearxResponse, SearxResult};

/// Client for a SearXNG-compatible JSON search backend.
///
/// 5xx responses, timeouts and network failures are retried with linear
/// backoff (`backoff * attempt`); 4xx responses fail immediately.
#[derive(Clone)]
pub struct SearchClient {
    http: HttpClient,
    engines: String,
    categories: String,
    username: Option<String>,
    password: Option<String>,
}

impl SearchClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, HttpError> {
        let mut base = settings.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = HttpClient::new(&base)?
            .with_timeout(Duration::from_millis(settings.timeout_ms))
            .with_retries(settings.retries)
            .with_backoff(Duration::from_millis(settings.backoff_ms));
        let (username, password) = match settings.credentials() {
            Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
            None => (None, None),
        };
        Ok(Self {
            http,
            engines: settings.engines.clone(),
            categories: settings.categories.clone(),
            username,
            password,
        })
    }

    /// Query the backend for one region code and return normalized hits
    /// in backend order.
    pub async fn search(
        &self,
        query: &str,
        safe: SafeSearch,
        region: &str,
    ) -> Result<Vec<SearchHit>, HttpError> {
        let language = language_for(region);
        let params: Vec<(&str, Cow<'_, str>)> = vec![
            ("q", query.into()),
            ("format", "json".into()),
            ("engines", self.engines.as_str().into()),
            ("language", language.into()),
            ("safesearch", safe.as_param().into()),
            ("categories", self.categories.as_str().into()),
        ];
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Auth::Basic {
                username: username.as_str(),
                password: password.as_str(),
            }),
            _ => None,
        };

        let query_snippet: String = query.chars().take(160).collect();
        let started = Instant::now();
        tracing::info!(target: "web.search", query = %query_snippet, region, language, "search.start");

        let outcome = self
            .http
            .get_json::<SearxResponse>(
                "search",
                RequestOpts {
                    auth,
                    headers: Some(headers),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await;

        match outcome {
            Ok(resp) => {
                let hits: Vec<SearchHit> = resp
                    .results
                    .iter()
                    .filter_map(SearxResult::normalize)
                    .collect();
                tracing::info!(
                    target: "web.search",
                    query = %query_snippet,
                    hits = hits.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "search.success"
                );
                Ok(hits)
            }
            Err(e) => {
                tracing::warn!(
                    target: "web.search",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "search.error"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_path_prefix() {
        let settings = SearchSettings {
            url: "https://proxy.example/searx".into(),
            ..SearchSettings::default()
        };
        let client = SearchClient::new(&settings).unwrap();
        assert_eq!(client.http.base().as_str(), "https://proxy.example/searx/");
        assert_eq!(client.http.max_retries, 2);
        assert_eq!(client.http.backoff, Duration::from_millis(350));
    }

    #[test]
    fn half_credentials_send_no_auth() {
        let settings = SearchSettings {
            username: Some("svc".into()),
            ..SearchSettings::default()
        };
        let client = SearchClient::new(&settings).unwrap();
        assert!(client.username.is_none());
    }
}
