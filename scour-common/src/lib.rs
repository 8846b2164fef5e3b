//! Common types and utilities shared across Scour crates.
//!
//! This crate is the bottom of the workspace graph: it carries the
//! caller-facing error type and the logging initialiser, and nothing that
//! would pull heavy transitive dependencies into the layers above it.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ScourError`] and [`Result`]: caller-facing error handling
//! - [`ErrorKind`]: stable classification used when an error is rendered
//!   back to a caller as a structured message
//!
//! Layer crates (`scour-http`, `scour-drivers`, `scour-web`, ...) keep their
//! own precise error enums and provide `From` conversions into
//! [`ScourError`] for callers that want a single type.
//!
//! # Examples
//!
//! ```rust
//! use scour_common::{ErrorKind, ScourError};
//!
//! let err = ScourError::RateLimited("per-second budget exhausted".into());
//! assert_eq!(err.kind(), ErrorKind::QuotaExhausted);
//! assert_eq!(err.kind().as_str(), "quota_exhausted");
//! ```

pub mod observability;

/// Coarse error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Timeout, non-success status, unreachable host, wrong content type.
    Transport,
    /// Browser launch failure or mid-session disconnect.
    Rendering,
    /// Search backend failed terminally (4xx or retries exhausted).
    Backend,
    /// Rate-limit rejection.
    QuotaExhausted,
    /// Caller supplied something unusable (bad URL, empty query).
    InvalidInput,
    /// Configuration was incomplete or invalid.
    Config,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Rendering => "rendering",
            Self::Backend => "backend",
            Self::QuotaExhausted => "quota_exhausted",
            Self::InvalidInput => "invalid_input",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types surfaced by the Scour pipeline to its callers.
#[derive(thiserror::Error, Debug)]
pub enum ScourError {
    /// Plain HTTP retrieval failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Rendered (browser) retrieval failed.
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// The search backend failed terminally.
    #[error("Search backend error: {0}")]
    Backend(String),

    /// The request was rejected by the rate limiter.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The caller's input could not be used.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its timeout.
    #[error("Timeout occurred")]
    Timeout,

    /// Unclassified failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScourError {
    /// Classification used for structured error messages.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Timeout => ErrorKind::Transport,
            Self::Rendering(_) => ErrorKind::Rendering,
            Self::Backend(_) => ErrorKind::Backend,
            Self::RateLimited(_) => ErrorKind::QuotaExhausted,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Config(_) => ErrorKind::Config,
            Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Render as the one-line structured message handed back to callers.
    pub fn to_message(&self) -> String {
        format!("error[{}]: {}", self.kind(), self)
    }
}

/// Convenient alias for results that use [`ScourError`].
pub type Result<T> = std::result::Result<T, ScourError>;
