//! Crawl Error Types
//!
//! A crawl never fails as a whole: every error is about one URL and is
//! reported as a [`Failed`](crate::CrawlEvent::Failed) event while the crawl
//! carries on.

use derive_more::{Display, Error};

/// A crawl error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for crawl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The page could not be fetched.
    #[display("could not fetch {_0}")]
    Fetch(#[error(not(source))] String),
    /// The page was fetched but is not a usable entry page.
    #[display("could not extract an entry from {_0}")]
    Extract(#[error(not(source))] String),
    /// Index pagination led back to a page that was already read.
    #[display("index pagination loops back to {_0}")]
    PaginationLoop(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(url) | Self::Extract(url) | Self::PaginationLoop(url) => url,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
