use std::sync::Arc;

use anyhow::{Context, Result};
use scour_config::ScourConfig;
use scour_drivers::{BrowserPool, ChromiumEngine};
use scour_web::{
    CacheSet, ExtractionDispatcher, PageFetcher, SearchService, TransportSelector, spawn_sweeper,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything a command needs, built once from configuration.
pub struct Scour {
    pub fetcher: PageFetcher,
    pub search: SearchService,
    pub caches: CacheSet,
    pool: Arc<BrowserPool>,
    cancel: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl Scour {
    pub fn build(cfg: &ScourConfig) -> Result<Self> {
        let engine = Arc::new(ChromiumEngine::new(cfg.browser.clone()));
        let pool = Arc::new(BrowserPool::new(engine, &cfg.browser));
        let caches = CacheSet::from_settings(&cfg.cache);

        let fetcher = PageFetcher::new(
            Arc::clone(&pool),
            TransportSelector::new(&cfg.browser),
            ExtractionDispatcher::with_defaults(),
            caches.page.clone(),
            cfg.fetch.clone(),
        )
        .context("building page fetcher")?;
        let search = SearchService::new(&cfg.search, &cfg.rate_limit)
            .with_context(|| format!("building search client for {}", cfg.search.url))?;

        tracing::info!(
            render_domains = ?cfg.browser.render_domains,
            serialize_domains = ?cfg.browser.serialize_domains,
            max_pages = cfg.browser.max_pages,
            cache_root = %cfg.cache.root.display(),
            search_url = %cfg.search.url,
            "scour.ready"
        );

        Ok(Self {
            fetcher,
            search,
            caches,
            pool,
            cancel: CancellationToken::new(),
            sweeper: None,
        })
    }

    /// Start the periodic cache sweep for the lifetime of this value.
    pub fn start_sweeper(&mut self, cfg: &ScourConfig) {
        if self.sweeper.is_none() {
            self.sweeper = Some(spawn_sweeper(
                self.caches.all(),
                cfg.cache.sweep_interval(),
                self.cancel.child_token(),
            ));
        }
    }

    /// Stop the sweeper and close the browser if one was launched.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.await;
        }
        if let Err(e) = self.pool.shutdown().await {
            tracing::warn!(error = %e, "scour.browser_shutdown_failed");
        }
    }
}
