//! Error handling for cctvloader

use thiserror::Error;

/// Main error type for cctvloader
#[derive(Debug, Error)]
pub enum CctvError {
    #[error("Unable to find {0} in page")]
    NotFound(String),

    #[error("Metadata endpoint failed: {0}")]
    Upstream(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Metadata response is missing required field `{0}`")]
    MissingField(String),

    #[error("No videos found on this page")]
    EmptyPlaylist,

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("No downloadable formats found")]
    NoFormats,

    #[error("Requested format `{0}` is not available")]
    FormatUnavailable(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CctvError {
    /// True when `err` carries a [`CctvError::Cancelled`] anywhere in its chain.
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<CctvError>(),
                Some(CctvError::Cancelled)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cancelled_detected_through_context() {
        let err = Err::<(), _>(CctvError::Cancelled)
            .context("while downloading")
            .unwrap_err();
        assert!(CctvError::is_cancelled(&err));
    }

    #[test]
    fn test_other_errors_are_not_cancellation() {
        let err: anyhow::Error = CctvError::EmptyPlaylist.into();
        assert!(!CctvError::is_cancelled(&err));
        assert_eq!(err.to_string(), "No videos found on this page");
    }

    #[test]
    fn test_messages_name_the_failing_step() {
        let page = CctvError::Request("HTTP 404 for http://tv.cctv.com/a.shtml".to_string());
        assert_eq!(
            page.to_string(),
            "Request failed: HTTP 404 for http://tv.cctv.com/a.shtml"
        );

        assert_eq!(CctvError::NoFormats.to_string(), "No downloadable formats found");
        assert_eq!(
            CctvError::FormatUnavailable("best[height<=144]".to_string()).to_string(),
            "Requested format `best[height<=144]` is not available"
        );
    }
}
