use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Failures of a rendered fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser disconnected")]
    Disconnected,
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    #[error("render timed out after {0:?}")]
    Timeout(Duration),
    #[error("no response for {0}")]
    NoResponse(String),
    #[error("navigation returned HTTP {0}")]
    Status(u16),
    #[error("page error: {0}")]
    Page(String),
}

/// One rendered fetch.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: Url,
    /// Bound on navigation (until the DOM is constructed).
    pub timeout: Duration,
    /// CSS selector awaited after navigation; best effort.
    pub wait_selector: Option<String>,
    pub wait_timeout: Duration,
}

impl RenderRequest {
    /// Bound on the whole page session: navigation plus the selector wait
    /// when one was asked for.
    pub fn budget(&self) -> Duration {
        match self.wait_selector {
            Some(_) => self.timeout.saturating_add(self.wait_timeout),
            None => self.timeout,
        }
    }
}

/// Launches the shared rendering process.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>, RenderError>;
}

/// A running browser able to render pages in isolated sessions.
///
/// `render` must close its page session on every path.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// `false` once the process reported a disconnect.
    fn is_connected(&self) -> bool;

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError>;

    async fn close(&self) -> Result<(), RenderError>;
}
