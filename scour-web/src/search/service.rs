use std::sync::Arc;

use futures::future::join_all;
use scour_config::{RateLimitSettings, SearchSettings};
use scour_http::HttpError;
use scour_limits::RateLimiter;

use super::client::SearchClient;
use super::region::{SafeSearch, resolve_region};
use super::report::{BatchEntry, render_batch, render_results};
use crate::error::SearchError;

/// Rate-limited single and batch web search producing markdown reports.
#[derive(Clone)]
pub struct SearchService {
    client: SearchClient,
    limiter: Arc<RateLimiter>,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(settings: &SearchSettings, limits: &RateLimitSettings) -> Result<Self, HttpError> {
        let limiter = Arc::new(RateLimiter::new(limits.per_second, limits.per_month));
        Ok(Self::with_limiter(SearchClient::new(settings)?, limiter, settings.clone()))
    }

    /// Share one limiter between several services.
    pub fn with_limiter(
        client: SearchClient,
        limiter: Arc<RateLimiter>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            client,
            limiter,
            settings,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// One query, weight 1 against the rate limiter.
    pub async fn web_search(
        &self,
        query: &str,
        count: Option<usize>,
        safe: SafeSearch,
        region: Option<&str>,
    ) -> Result<String, SearchError> {
        let query = self.validate(query)?;
        self.limiter.check_and_consume(1)?;
        self.run(query, count, safe, region).await
    }

    /// Several queries admitted as one request of weight `queries.len()`,
    /// run concurrently. Individual failures become `Error:` sections.
    pub async fn batch_search(
        &self,
        queries: &[String],
        count: Option<usize>,
        safe: SafeSearch,
        region: Option<&str>,
    ) -> Result<String, SearchError> {
        if queries.is_empty() {
            return Err(SearchError::InvalidQuery("batch is empty".into()));
        }
        if queries.len() > self.settings.max_batch_queries {
            return Err(SearchError::InvalidQuery(format!(
                "batch of {} exceeds the limit of {} queries",
                queries.len(),
                self.settings.max_batch_queries
            )));
        }
        self.limiter.check_and_consume(queries.len() as u64)?;
        tracing::info!(target: "web.search", queries = queries.len(), "search.batch.start");

        let jobs = queries.iter().map(|q| async move {
            let outcome = match self.validate(q) {
                Ok(valid) => self.run(valid, count, safe, region).await,
                Err(e) => Err(e),
            };
            BatchEntry {
                query: q.clone(),
                outcome: outcome.map_err(|e| e.to_string()),
            }
        });
        let entries = join_all(jobs).await;

        let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
        tracing::info!(target: "web.search", queries = entries.len(), failed, "search.batch.done");
        Ok(render_batch(&entries))
    }

    fn validate<'q>(&self, query: &'q str) -> Result<&'q str, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".into()));
        }
        let len = trimmed.chars().count();
        if len > self.settings.max_query_length {
            return Err(SearchError::InvalidQuery(format!(
                "query is {len} characters, limit is {}",
                self.settings.max_query_length
            )));
        }
        Ok(trimmed)
    }

    async fn run(
        &self,
        query: &str,
        count: Option<usize>,
        safe: SafeSearch,
        region: Option<&str>,
    ) -> Result<String, SearchError> {
        let count = count
            .unwrap_or(self.settings.default_results)
            .clamp(1, self.settings.max_results.max(1));
        let region = resolve_region(region, &self.settings.default_region);
        let mut hits = self
            .client
            .search(query, safe, &region.resolved)
            .await
            .map_err(SearchError::Backend)?;
        hits.truncate(count);
        Ok(render_results(query, &region, &hits))
    }
}
