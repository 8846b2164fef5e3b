use scour_common::ScourError;
use scour_drivers::RenderError;
use scour_http::HttpError;
use scour_limits::RateLimitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to fetch URL: {0}")]
    Transport(#[from] HttpError),
    #[error("Failed to render page: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error("Search backend failed: {0}")]
    Backend(HttpError),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<FetchError> for ScourError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl { .. } => ScourError::InvalidInput(err.to_string()),
            FetchError::Transport(HttpError::Timeout(_)) => ScourError::Timeout,
            FetchError::Transport(e) => ScourError::Transport(e.to_string()),
            FetchError::Render(RenderError::NavigationTimeout(_) | RenderError::Timeout(_)) => {
                ScourError::Timeout
            }
            FetchError::Render(e) => ScourError::Rendering(e.to_string()),
        }
    }
}

impl From<SearchError> for ScourError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::RateLimited(e) => ScourError::RateLimited(e.to_string()),
            SearchError::Backend(e) => ScourError::Backend(e.to_string()),
            SearchError::InvalidQuery(q) => ScourError::InvalidInput(q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scour_common::ErrorKind;
    use std::time::Duration;

    #[test]
    fn fetch_errors_keep_their_class() {
        let timeout: ScourError = FetchError::Transport(HttpError::Timeout(Duration::from_secs(1))).into();
        assert_eq!(timeout.kind(), ErrorKind::Transport);

        let slow: ScourError = FetchError::Render(RenderError::Timeout(Duration::from_secs(35))).into();
        assert!(matches!(slow, ScourError::Timeout));

        let render: ScourError = FetchError::Render(RenderError::Disconnected).into();
        assert_eq!(render.kind(), ErrorKind::Rendering);

        let bad: ScourError = FetchError::InvalidUrl {
            url: "ftp://x".into(),
            reason: "unsupported scheme".into(),
        }
        .into();
        assert_eq!(bad.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn search_errors_keep_their_class() {
        let err: ScourError = SearchError::Backend(HttpError::Network("refused".into())).into();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("refused"));

        let err: ScourError = SearchError::InvalidQuery("empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
