#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(feature = "chromium")]
pub mod discovery;
pub mod engine;
pub mod fingerprint;
pub mod pool;
pub mod stealth;
