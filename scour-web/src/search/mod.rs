//! Web search through a SearXNG-compatible backend.

pub mod client;
pub mod region;
pub mod report;
pub mod service;
pub mod types;

pub use client::SearchClient;
pub use region::{ResolvedRegion, SafeSearch, language_for, resolve_region};
pub use service::SearchService;
pub use types::SearchHit;
