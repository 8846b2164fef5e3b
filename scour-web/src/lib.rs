//! Content acquisition: fetch, normalize, cache, search.
//!
//! - [`fetch::PageFetcher`]: cache lookup, plain HTTP or rendered fetch,
//!   extraction, cache write
//! - [`transport::TransportSelector`]: which hosts need the browser
//! - [`extract`]: site extractors, the generic transform and the
//!   [`extract::ExtractionDispatcher`] that always yields a document
//! - [`cache`]: TTL file caches and the background sweeper
//! - [`search`]: backend client, region resolution and the rate-limited
//!   [`search::SearchService`]

pub mod cache;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod search;
pub mod transport;

pub use cache::{CacheError, CacheSet, FileCache, KeyScheme, spawn_sweeper};
pub use error::{FetchError, SearchError};
pub use extract::{Document, ExtractionDispatcher, SiteExtractor};
pub use fetch::PageFetcher;
pub use search::{SafeSearch, SearchService};
pub use transport::{Route, TransportSelector};
