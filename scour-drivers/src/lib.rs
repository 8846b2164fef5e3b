//! Driver layer for rendered (browser) retrieval.
//!
//! This crate owns the shared headless browser and hands out short-lived,
//! isolated page sessions under bounded concurrency.
//!
//! - [`scour_browser::engine`]: the [`BrowserEngine`] / [`BrowserProcess`]
//!   seam and [`RenderError`]
//! - [`scour_browser::pool::BrowserPool`]: lazily (re)launched shared
//!   process, global and per-domain gates, `render_page`
//! - [`scour_browser::chromium`]: Chromium over CDP (`chromiumoxide`)
//! - [`scour_browser::stealth`] / [`scour_browser::fingerprint`]: client
//!   identity profiles and automation-masking scripts
pub mod scour_browser;

pub use scour_browser::engine::{BrowserEngine, BrowserProcess, RenderError, RenderRequest};
pub use scour_browser::pool::BrowserPool;

#[cfg(feature = "chromium")]
pub use scour_browser::chromium::ChromiumEngine;
