//! Minimal HTTP client with safe logging, retries, and basic auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - Redacts credentials and never logs secret values
//! - Retries network failures and 5xx with linearly growing backoff;
//!   4xx responses are terminal
//! - Optional *raw* request/response logging via `SCOUR_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), scour_http::HttpError> {
//! let client = scour_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", scour_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors, and
//! (optionally) raw request/response lines (target `http.raw`).

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SCOUR_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "password"
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, auth_kind: &str) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in headers.iter() {
        let mut v = val.to_str().unwrap_or("").to_string();
        if is_secret_key(name.as_str()) {
            v = "<redacted>".into();
        }
        parts.push(format!(
            "-H '{}: {}'",
            name.as_str(),
            v.replace('\'', r"'\''")
        ));
    }
    if auth_kind != "none" {
        parts.push(format!("-H 'authorization: <redacted {auth_kind}>'"));
    }
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = redact_query(url);
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if is_secret_key(&key) || key.eq_ignore_ascii_case("set-cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

fn redact_query(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = if is_secret_key(&k) {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            (k, v)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("HTTP {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected content type {got:?} (expected {expected})")]
    ContentType { expected: String, got: String },
}

impl HttpError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Api { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use scour_http::Auth;
///
/// let basic = Auth::Basic { username: "svc", password: "pw" };
/// assert_eq!(basic.kind(), "basic");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Basic base64(user:pass)
    Basic {
        username: &'a str,
        password: &'a str,
    },
    None,
}

impl Auth<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::None => "none",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use scour_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     query: Some(vec![("q", Cow::Borrowed("minsk"))]),
///     expect_content_type: Some("text/html"),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
    /// Reject successful responses whose `content-type` lacks this fragment.
    pub expect_content_type: Option<&'a str>,
}

/// A successful non-JSON response.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

struct RawResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    bytes: Vec<u8>,
    req_id: String,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
    /// Delay unit; attempt `n` (1-based) waits `n * backoff`.
    pub backoff: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use scour_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff: Duration::from_millis(350),
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use scour_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(5);
    /// assert_eq!(client.max_retries, 5);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_backoff(mut self, unit: Duration) -> Self {
        self.backoff = unit;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET JSON with per-request options (headers/query/auth/timeout/retries).
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let raw = self.execute(Method::GET, path, opts).await?;
        let snippet = snip_body(&raw.bytes);
        serde_json::from_slice::<T>(&raw.bytes).map_err(|e| {
            tracing::warn!(
                req_id=%raw.req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e.to_string(),
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// GET a textual document (HTML, plain text) with per-request options.
    pub async fn get_text(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<TextResponse, HttpError> {
        let raw = self.execute(Method::GET, path, opts).await?;
        let content_type = header_str(&raw.headers, CONTENT_TYPE.as_str()).map(str::to_string);
        Ok(TextResponse {
            url: raw.url,
            status: raw.status,
            content_type,
            body: String::from_utf8_lossy(&raw.bytes).into_owned(),
        })
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        self.backoff.saturating_mul(attempt as u32)
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn execute(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<RawResponse, HttpError> {
        let mut url = self.resolve(path, opts.allow_absolute)?;
        if let Some(q) = &opts.query {
            url.query_pairs_mut()
                .extend_pairs(q.iter().map(|(k, v)| (*k, v.as_ref())));
        }

        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let auth_kind = opts.auth.as_ref().map(Auth::kind).unwrap_or("none");
        let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
        let mut attempt = 0usize;

        loop {
            // ----- Build request -----
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            match &opts.auth {
                Some(Auth::Basic { username, password }) => {
                    rb = rb.basic_auth(username, Some(password));
                }
                Some(Auth::None) | None => {}
            }

            let req_id = uuid::Uuid::new_v4().simple().to_string();
            let attempt0 = attempt + 1;

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt0,
                max_retries,
                method=%method,
                host_path=%host_path,
                query=?redact_query(&url),
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                "http.request.start"
            );

            if raw_enabled() {
                let merged = opts.headers.clone().unwrap_or_default();
                let curl = make_curl(&method, &url, &merged, auth_kind);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let outcome = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().clone();
                    let headers = resp.headers().clone();
                    match resp.bytes().await {
                        Ok(bytes) => Ok(RawResponse {
                            url: final_url,
                            status,
                            headers,
                            bytes: bytes.to_vec(),
                            req_id: req_id.clone(),
                        }),
                        Err(err) => Err(classify_transport(err, timeout)),
                    }
                }
                Err(err) => Err(classify_transport(err, timeout)),
            };

            let raw = match outcome {
                Ok(raw) => raw,
                Err(err) => {
                    if err.is_retryable() && attempt < max_retries {
                        attempt += 1;
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            error=%err,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        error=%err,
                        "http.network_error"
                    );
                    return Err(err);
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;
            let status = raw.status;

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=raw.bytes.len(),
                final_url=%raw.url,
                content_type=?header_str(&raw.headers, CONTENT_TYPE.as_str()),
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&raw.headers);
                let truncated = raw.bytes.len() > RAW_MAX_BODY;
                let end = raw.bytes.len().min(RAW_MAX_BODY);
                let text = String::from_utf8_lossy(&raw.bytes[..end]);
                tracing::info!(
                    target:"http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated
                );
            }

            let snippet = snip_body(&raw.bytes);
            tracing::trace!(
                req_id=%req_id,
                body_snippet=%snippet,
                "http.response.body_snippet"
            );

            // ----- Success path -----
            if status.is_success() {
                if let Some(expected) = opts.expect_content_type {
                    let got = header_str(&raw.headers, CONTENT_TYPE.as_str()).unwrap_or("");
                    if !got.to_ascii_lowercase().contains(expected) {
                        tracing::warn!(
                            req_id=%req_id,
                            expected,
                            got,
                            "http.content_type_mismatch"
                        );
                        return Err(HttpError::ContentType {
                            expected: expected.to_string(),
                            got: got.to_string(),
                        });
                    }
                }
                return Ok(raw);
            }

            // ----- Non-success: maybe retry -----
            let err = HttpError::Api {
                status,
                message: extract_error_message(&raw.bytes),
            };

            if err.is_retryable() && attempt < max_retries {
                attempt += 1;
                let delay = self.backoff_delay(attempt);
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    error=%err,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                error=%err,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(err);
        }
    }
}

// ==============================
// Helpers
// ==============================

fn classify_transport(err: reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(timeout)
    } else if err.is_builder() {
        HttpError::Build(err.to_string())
    } else {
        HttpError::Network(err.to_string())
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn extract_error_message(body: &[u8]) -> String {
    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}
