//! Chromium over the DevTools protocol.
//!
//! One [`ChromiumProcess`] is shared by every caller; each render runs in
//! its own browser context (separate cookies and storage) and page, both
//! disposed before `render` returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
    DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use scour_config::BrowserSettings;
use tokio::task::JoinHandle;

use super::discovery::find_browser_executable;
use super::engine::{BrowserEngine, BrowserProcess, RenderError, RenderRequest};
use super::fingerprint::{UserAgentManager, UserAgentProfile};
use super::stealth::{StealthScripts, build_launch_arguments};

const READY_POLL: Duration = Duration::from_millis(50);
const STATUS_SCRIPT: &str = "(() => { const e = performance.getEntriesByType('navigation')[0]; return e && e.responseStatus ? e.responseStatus : 0; })()";

/// Launches Chromium with the configured flags and a random desktop profile.
pub struct ChromiumEngine {
    settings: BrowserSettings,
    profiles: UserAgentManager,
    launches: AtomicUsize,
}

impl ChromiumEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        let profiles = UserAgentManager::new(&settings.locale);
        Self {
            settings,
            profiles,
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>, RenderError> {
        let exe = find_browser_executable(self.settings.executable_path.as_deref())?;
        let profile = self.profiles.pick();
        let seq = self.launches.fetch_add(1, Ordering::Relaxed);
        let user_data_dir =
            std::env::temp_dir().join(format!("scour-chromium-{}-{seq}", std::process::id()));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(exe)
            .user_data_dir(&user_data_dir)
            .window_size(profile.viewport.0, profile.viewport.1)
            .launch_timeout(Duration::from_secs(20))
            .request_timeout(Duration::from_secs(30))
            .args(build_launch_arguments(&self.settings.launch_args, &profile));
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        tracing::info!(
            target: "browser",
            seq,
            headless = self.settings.headless,
            user_agent = %profile.user_agent,
            "browser.launch"
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // unknown CDP events chromiumoxide cannot deserialize
                    if msg.contains("data did not match any variant")
                        || msg.contains("Failed to deserialize WS response")
                    {
                        tracing::trace!(target: "browser", error = %msg, "browser.handler.ignored");
                    } else {
                        tracing::warn!(target: "browser", error = %msg, "browser.handler.error");
                    }
                }
            }
            flag.store(false, Ordering::SeqCst);
            tracing::warn!(target: "browser", seq, "browser.disconnected");
        });

        Ok(Arc::new(ChromiumProcess {
            browser,
            handler: handler_task,
            connected,
            profile,
            user_data_dir,
        }))
    }
}

pub struct ChromiumProcess {
    browser: Browser,
    handler: JoinHandle<()>,
    connected: Arc<AtomicBool>,
    profile: UserAgentProfile,
    user_data_dir: PathBuf,
}

impl ChromiumProcess {
    fn cdp_error(&self, err: CdpError) -> RenderError {
        if self.is_connected() {
            RenderError::Page(err.to_string())
        } else {
            RenderError::Disconnected
        }
    }

    async fn render_in_context(
        &self,
        context: &BrowserContextId,
        request: &RenderRequest,
    ) -> Result<String, RenderError> {
        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context.clone());
        let page = self
            .browser
            .new_page(target)
            .await
            .map_err(|e| self.cdp_error(e))?;

        let outcome = self.drive(&page, request).await;
        if let Err(e) = page.close().await {
            tracing::debug!(target: "browser", error = %e, "browser.page.close_failed");
        }
        outcome
    }

    async fn prepare(&self, page: &Page) -> Result<(), CdpError> {
        let mut ua = SetUserAgentOverrideParams::new(self.profile.user_agent.clone());
        ua.accept_language = Some(self.profile.accept_language());
        ua.platform = Some(self.profile.platform.clone());
        page.execute(ua).await?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(self.profile.viewport.0),
            i64::from(self.profile.viewport.1),
            1.0,
            false,
        ))
        .await?;
        page.execute(SetTimezoneOverrideParams::new(self.profile.timezone.clone()))
            .await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            StealthScripts::for_profile(&self.profile),
        ))
        .await?;
        Ok(())
    }

    /// Navigate and wait until the DOM is constructed; returns the primary
    /// document status when the page exposes it (0 otherwise).
    async fn navigate(&self, page: &Page, url: &str) -> Result<i64, RenderError> {
        let nav = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| self.cdp_error(e))?;
        if let Some(text) = nav.result.error_text.as_deref().filter(|t| !t.is_empty()) {
            return Err(RenderError::NoResponse(format!("{url}: {text}")));
        }

        loop {
            let state = page
                .evaluate("document.readyState")
                .await
                .map_err(|e| self.cdp_error(e))?
                .into_value::<String>()
                .unwrap_or_default();
            if state == "interactive" || state == "complete" {
                break;
            }
            tokio::time::sleep(READY_POLL).await;
        }

        let status = page
            .evaluate(STATUS_SCRIPT)
            .await
            .map_err(|e| self.cdp_error(e))?
            .into_value::<i64>()
            .unwrap_or(0);
        Ok(status)
    }

    async fn wait_for_selector(&self, page: &Page, selector: &str, timeout: Duration) -> bool {
        let start = tokio::time::Instant::now();
        let mut poll = Duration::from_millis(100);
        loop {
            if page.find_element(selector).await.is_ok() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(poll.min(timeout.saturating_sub(start.elapsed()))).await;
            poll = (poll * 2).min(Duration::from_secs(1));
        }
    }

    async fn drive(&self, page: &Page, request: &RenderRequest) -> Result<String, RenderError> {
        let budget = request.budget();
        tokio::time::timeout(budget, self.drive_steps(page, request))
            .await
            .map_err(|_| RenderError::Timeout(budget))?
    }

    async fn drive_steps(&self, page: &Page, request: &RenderRequest) -> Result<String, RenderError> {
        self.prepare(page).await.map_err(|e| self.cdp_error(e))?;

        let url = request.url.as_str();
        let status = tokio::time::timeout(request.timeout, self.navigate(page, url))
            .await
            .map_err(|_| RenderError::NavigationTimeout(request.timeout))??;
        if status >= 400 {
            return Err(RenderError::Status(status as u16));
        }

        if let Some(selector) = request.wait_selector.as_deref() {
            let found = self
                .wait_for_selector(page, selector, request.wait_timeout)
                .await;
            tracing::debug!(target: "browser", url, selector, found, "browser.wait_selector");
        }

        page.content().await.map_err(|e| self.cdp_error(e))
    }
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        if !self.is_connected() {
            return Err(RenderError::Disconnected);
        }
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| self.cdp_error(e))?
            .result
            .browser_context_id;

        let outcome = self.render_in_context(&context, request).await;

        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(context))
            .await
        {
            tracing::debug!(target: "browser", error = %e, "browser.context.dispose_failed");
        }
        outcome
    }

    async fn close(&self) -> Result<(), RenderError> {
        let closed = self.browser.execute(CloseParams::default()).await;
        self.connected.store(false, Ordering::SeqCst);
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            tracing::debug!(
                target: "browser",
                dir = %self.user_data_dir.display(),
                error = %e,
                "browser.profile_dir.cleanup_failed"
            );
        }
        closed
            .map(|_| ())
            .map_err(|e| RenderError::Page(e.to_string()))
    }
}

impl Drop for ChromiumProcess {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
