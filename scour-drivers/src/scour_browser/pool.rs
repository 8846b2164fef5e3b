use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use scour_config::BrowserSettings;
use scour_limits::{Gate, GatePermit};
use tokio::sync::Mutex;
use url::Url;

use super::engine::{BrowserEngine, BrowserProcess, RenderError, RenderRequest};

enum Handle {
    Vacant,
    Live(Arc<dyn BrowserProcess>),
}

/// Shared browser plus the admission gates in front of it.
///
/// The process is launched by the first render, replaced by whichever
/// render first sees it disconnected, and left vacant by [`shutdown`].
///
/// [`shutdown`]: BrowserPool::shutdown
pub struct BrowserPool {
    engine: Arc<dyn BrowserEngine>,
    handle: Mutex<Handle>,
    global: Arc<Gate>,
    serialize_domains: HashSet<String>,
    domain_gates: DashMap<String, Arc<Gate>>,
    wait_timeout: Duration,
}

impl BrowserPool {
    pub fn new(engine: Arc<dyn BrowserEngine>, settings: &BrowserSettings) -> Self {
        Self {
            engine,
            handle: Mutex::new(Handle::Vacant),
            global: Gate::new("browser.global", settings.max_pages),
            serialize_domains: settings
                .serialize_domains
                .iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .collect(),
            domain_gates: DashMap::new(),
            wait_timeout: settings.wait_selector_timeout(),
        }
    }

    pub fn global_gate(&self) -> &Arc<Gate> {
        &self.global
    }

    /// The capacity-1 gate for a serialized host, created on first use.
    pub fn domain_gate(&self, host: &str) -> Option<Arc<Gate>> {
        let host = host.to_ascii_lowercase();
        if !self.serialize_domains.contains(&host) {
            return None;
        }
        let gate = self
            .domain_gates
            .entry(host.clone())
            .or_insert_with(|| Gate::new(format!("browser.domain.{host}"), 1));
        Some(Arc::clone(gate.value()))
    }

    /// Render `url` and return the materialized markup.
    ///
    /// Takes the host's serialization gate (if any) before the global gate;
    /// both are released on every exit path.
    pub async fn render_page(
        &self,
        url: &Url,
        timeout: Duration,
        wait_selector: Option<&str>,
    ) -> Result<String, RenderError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        let _domain_permit: Option<GatePermit> = match self.domain_gate(&host) {
            Some(gate) => Some(gate.acquire().await),
            None => None,
        };
        let _global_permit = self.global.acquire().await;

        let process = self.live_process().await?;
        let request = RenderRequest {
            url: url.clone(),
            timeout,
            wait_selector: wait_selector.map(str::to_string),
            wait_timeout: self.wait_timeout,
        };

        let started = tokio::time::Instant::now();
        let outcome = process.render(&request).await;
        match &outcome {
            Ok(html) => tracing::info!(
                target: "browser",
                url = %url,
                bytes = html.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "browser.render.ok"
            ),
            Err(err) => {
                tracing::warn!(target: "browser", url = %url, error = %err, "browser.render.failed");
                if matches!(err, RenderError::Disconnected) || !process.is_connected() {
                    self.invalidate(&process).await;
                }
            }
        }
        outcome
    }

    async fn live_process(&self) -> Result<Arc<dyn BrowserProcess>, RenderError> {
        let mut handle = self.handle.lock().await;
        if let Handle::Live(process) = &*handle {
            if process.is_connected() {
                return Ok(Arc::clone(process));
            }
            tracing::warn!(target: "browser", "browser.relaunch");
            *handle = Handle::Vacant;
        }
        let process = self.engine.launch().await?;
        *handle = Handle::Live(Arc::clone(&process));
        Ok(process)
    }

    async fn invalidate(&self, stale: &Arc<dyn BrowserProcess>) {
        let mut handle = self.handle.lock().await;
        if let Handle::Live(current) = &*handle {
            if same_process(current, stale) {
                *handle = Handle::Vacant;
            }
        }
    }

    /// Close the live process, if any. A later render relaunches.
    pub async fn shutdown(&self) -> Result<(), RenderError> {
        let previous = std::mem::replace(&mut *self.handle.lock().await, Handle::Vacant);
        match previous {
            Handle::Live(process) => {
                tracing::info!(target: "browser", "browser.shutdown");
                process.close().await
            }
            Handle::Vacant => Ok(()),
        }
    }

    pub async fn is_live(&self) -> bool {
        matches!(&*self.handle.lock().await, Handle::Live(p) if p.is_connected())
    }
}

fn same_process(a: &Arc<dyn BrowserProcess>, b: &Arc<dyn BrowserProcess>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        per_host: StdMutex<HashMap<String, (usize, usize)>>,
        selectors: StdMutex<Vec<Option<String>>>,
    }

    struct FakeProcess {
        counters: Arc<Counters>,
        connected: AtomicBool,
    }

    #[async_trait]
    impl BrowserProcess for FakeProcess {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
            let host = request.url.host_str().unwrap_or_default().to_string();
            self.counters
                .selectors
                .lock()
                .unwrap()
                .push(request.wait_selector.clone());
            let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(now, Ordering::SeqCst);
            {
                let mut per_host = self.counters.per_host.lock().unwrap();
                let entry = per_host.entry(host.clone()).or_default();
                entry.0 += 1;
                entry.1 = entry.1.max(entry.0);
            }

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.counters.per_host.lock().unwrap().get_mut(&host).unwrap().0 -= 1;

            match host.as_str() {
                "broken.example" => Err(RenderError::Status(503)),
                "crash.example" => {
                    self.connected.store(false, Ordering::SeqCst);
                    Err(RenderError::Disconnected)
                }
                _ => Ok(format!("<html><title>{}</title></html>", request.url)),
            }
        }

        async fn close(&self) -> Result<(), RenderError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeEngine {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BrowserEngine for FakeEngine {
        async fn launch(&self) -> Result<Arc<dyn BrowserProcess>, RenderError> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeProcess {
                counters: Arc::clone(&self.counters),
                connected: AtomicBool::new(true),
            }))
        }
    }

    fn pool(max_pages: usize) -> (Arc<BrowserPool>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let settings = BrowserSettings {
            max_pages,
            serialize_domains: vec!["cars.av.by".into()],
            ..BrowserSettings::default()
        };
        let engine = Arc::new(FakeEngine {
            counters: Arc::clone(&counters),
        });
        (Arc::new(BrowserPool::new(engine, &settings)), counters)
    }

    async fn render_all(pool: &Arc<BrowserPool>, urls: Vec<String>) -> Vec<Result<String, RenderError>> {
        let handles: Vec<_> = urls
            .into_iter()
            .map(|u| {
                let pool = Arc::clone(pool);
                tokio::spawn(async move {
                    let url = Url::parse(&u).unwrap();
                    pool.render_page(&url, Duration::from_secs(5), None).await
                })
            })
            .collect();
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn global_gate_bounds_open_pages() {
        let (pool, counters) = pool(4);
        let urls = (0..12).map(|i| format!("https://site{i}.example/")).collect();
        let results = render_all(&pool, urls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(counters.peak.load(Ordering::SeqCst), 4);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(pool.global_gate().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn serialized_domain_never_runs_twice_at_once() {
        let (pool, counters) = pool(4);
        let mut urls: Vec<String> = (0..6)
            .map(|i| format!("https://cars.av.by/listing?page={i}"))
            .collect();
        urls.extend((0..3).map(|i| format!("https://www.kufar.by/l?page={i}")));
        let results = render_all(&pool, urls).await;

        assert!(results.iter().all(Result::is_ok));
        let per_host = counters.per_host.lock().unwrap();
        assert_eq!(per_host["cars.av.by"].1, 1);
        assert!(per_host["www.kufar.by"].1 > 1);
        assert!(pool.domain_gate("www.kufar.by").is_none());
        assert_eq!(pool.domain_gate("CARS.AV.BY").unwrap().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_release_both_gates() {
        let (pool, _) = pool(1);
        let url = Url::parse("https://broken.example/").unwrap();
        let err = pool
            .render_page(&url, Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::Status(503));
        assert_eq!(pool.global_gate().active(), 0);

        let ok = Url::parse("https://fine.example/").unwrap();
        assert!(pool.render_page(&ok, Duration::from_secs(1), None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_triggers_relaunch_on_next_render() {
        let (pool, counters) = pool(2);
        let crash = Url::parse("https://crash.example/").unwrap();
        let err = pool
            .render_page(&crash, Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::Disconnected);
        assert!(!pool.is_live().await);

        let ok = Url::parse("https://fine.example/").unwrap();
        pool.render_page(&ok, Duration::from_secs(1), None)
            .await
            .unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_leaves_handle_vacant() {
        let (pool, counters) = pool(2);
        let ok = Url::parse("https://fine.example/").unwrap();
        pool.render_page(&ok, Duration::from_secs(1), None)
            .await
            .unwrap();
        assert!(pool.is_live().await);

        pool.shutdown().await.unwrap();
        assert!(!pool.is_live().await);

        pool.render_page(&ok, Duration::from_secs(1), None)
            .await
            .unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn render_uses_only_the_callers_selector() {
        let (pool, counters) = pool(1);
        let url = Url::parse("https://cars.av.by/filter").unwrap();
        pool.render_page(&url, Duration::from_secs(1), None)
            .await
            .unwrap();
        pool.render_page(&url, Duration::from_secs(1), Some(".card"))
            .await
            .unwrap();
        assert_eq!(
            counters.selectors.lock().unwrap().as_slice(),
            &[None, Some(".card".to_string())]
        );
    }
}
