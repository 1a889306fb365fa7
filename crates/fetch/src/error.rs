//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every kind carries the URL that
//! failed, so a crawl report can name the page without the caller having to
//! thread it through.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested URL is not something the fetcher can request.
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// The document does not exist (HTTP 404/410, or unknown to the mock).
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("HTTP {status} for {url}")]
    Status {
        url: String,
        status: u16,
    },
    /// The request did not complete in time.
    #[display("timed out: {_0}")]
    Timeout(#[error(not(source))] String),
    /// Connection-level failure (DNS, TLS, reset, ...).
    #[display("network error for {url}: {cause}")]
    Network {
        url: String,
        cause: String,
    },
    /// The response body could not be read or decoded.
    #[display("unreadable body for {_0}")]
    Body(#[error(not(source))] String),
    /// Client could not be constructed.
    #[display("fetcher setup failed: {_0}")]
    Setup(#[error(not(source))] String),
}

impl ErrorKind {
    /// The URL the error is about, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::InvalidUrl(url) | Self::NotFound(url) | Self::Timeout(url) | Self::Body(url) => Some(url),
            Self::Status { url, .. } | Self::Network { url, .. } => Some(url),
            Self::Setup(_) => None,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network { .. } | Self::Body(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) | Self::NotFound(_) | Self::Setup(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::Status { url: "u".into(), status: 503 }.is_retryable());
        assert!(ErrorKind::Status { url: "u".into(), status: 429 }.is_retryable());
        assert!(!ErrorKind::Status { url: "u".into(), status: 403 }.is_retryable());
        assert!(!ErrorKind::NotFound("u".into()).is_retryable());
        assert!(ErrorKind::Timeout("u".into()).is_retryable());
    }

    #[test]
    fn test_url() {
        assert_eq!(ErrorKind::Status { url: "https://a.example/".into(), status: 500 }.url(), Some("https://a.example/"));
        assert_eq!(ErrorKind::Setup("tls".into()).url(), None);
    }
}
