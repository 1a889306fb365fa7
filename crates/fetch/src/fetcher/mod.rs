//! Fetcher trait and implementations.
//!
//! Extraction never talks to the network itself: everything that needs a
//! document goes through a [`Fetcher`], so the crawl can be driven by a real
//! HTTP client or by an in-memory fixture set alike.

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "http")]
pub use self::http::HttpFetcher;
#[cfg(feature = "mock")]
pub use self::mock::MockFetcher;
use crate::Page;
use crate::error::Result;
use async_trait::async_trait;

/// Unified interface for page transports.
///
/// Implementations don't retry: a failed fetch is reported once and the
/// caller decides what that failure means (an aborted entry, a failed
/// relation list).
///
/// # Examples
///
/// ```
/// use memex_fetch::{Fetcher, error::Result};
///
/// async fn body_length(fetcher: &dyn Fetcher, url: &str) -> Result<usize> {
///     let page = fetcher.fetch(url).await?;
///     Ok(page.body.len())
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Name of the transport, used for logging only.
    fn name(&self) -> &str;

    /// Fetch the document at `url`.
    ///
    /// The returned [`Page::url`] is the final URL after redirects.
    async fn fetch(&self, url: &str) -> Result<Page>;
}
