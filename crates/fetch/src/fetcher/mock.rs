//! In-memory fetcher for testing.

use super::Fetcher;
use crate::Page;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum Response {
    /// Final URL and body.
    Page(String, String),
    Fail(ErrorKind),
}

#[derive(Debug, Default)]
struct State {
    responses: HashMap<String, Response>,
    delays: HashMap<String, Duration>,
    fetches: HashMap<String, usize>,
}

/// In-memory fetcher for testing.
///
/// Pages are stored in a `HashMap` behind a [`RwLock`], and every call to
/// [`fetch`](Fetcher::fetch) is counted per URL (including failed ones), so
/// tests can assert how often a document was requested. Unknown URLs fail
/// with [`NotFound`](ErrorKind::NotFound).
///
/// # Examples
///
/// ```
/// use memex_fetch::{Fetcher, fetcher::MockFetcher};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = MockFetcher::with_pages([("https://example.org/a", "<html>...</html>")]);
/// let page = fetcher.fetch("https://example.org/a").await?;
/// assert_eq!(page.body, "<html>...</html>");
/// assert_eq!(fetcher.fetch_count("https://example.org/a").await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockFetcher {
    name: String,
    state: RwLock<State>,
}

impl MockFetcher {
    /// Create a mock fetcher pre-populated with pages, keyed by URL.
    pub fn with_pages(pages: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        let responses = pages
            .into_iter()
            .map(|(url, body)| {
                let url = url.into();
                (url.clone(), Response::Page(url, body.into()))
            })
            .collect();
        Self { name: "mock".to_string(), state: RwLock::new(State { responses, ..State::default() }) }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Serve `body` for `url`, reporting `final_url` as where it was found.
    pub fn with_redirect(mut self, url: impl Into<String>, final_url: impl Into<String>, body: impl Into<String>) -> Self {
        self.state.get_mut().responses.insert(url.into(), Response::Page(final_url.into(), body.into()));
        self
    }

    /// Make every fetch of `url` fail with `kind`.
    pub fn with_failure(mut self, url: impl Into<String>, kind: ErrorKind) -> Self {
        self.state.get_mut().responses.insert(url.into(), Response::Fail(kind));
        self
    }

    /// Delay every fetch of `url` by `delay` before answering.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.state.get_mut().delays.insert(url.into(), delay);
        self
    }

    pub async fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        let url = url.into();
        self.state.write().await.responses.insert(url.clone(), Response::Page(url, body.into()));
    }

    /// Number of times `url` was requested.
    pub async fn fetch_count(&self, url: &str) -> usize {
        self.state.read().await.fetches.get(url).copied().unwrap_or_default()
    }

    /// Number of requests across all URLs.
    pub async fn total_fetches(&self) -> usize {
        self.state.read().await.fetches.values().sum()
    }
}
impl Default for MockFetcher {
    fn default() -> Self {
        let pages: [(&str, &str); 0] = [];
        Self::with_pages(pages)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, url: &str) -> Result<Page> {
        // Count and look up under the write lock, then drop it before
        // sleeping so concurrent fetches of other URLs aren't serialized.
        let (response, delay) = {
            let mut state = self.state.write().await;
            *state.fetches.entry(url.to_string()).or_default() += 1;
            (state.responses.get(url).cloned(), state.delays.get(url).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match response {
            Some(Response::Page(final_url, body)) => Ok(Page::new(final_url, body)),
            Some(Response::Fail(kind)) => Err(exn::Exn::from(kind)),
            None => Err(exn::Exn::from(ErrorKind::NotFound(url.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_and_count() {
        let fetcher = MockFetcher::with_pages([("https://example.org/a", "A")]);
        assert_eq!(fetcher.fetch("https://example.org/a").await.unwrap().body, "A");
        fetcher.fetch("https://example.org/a").await.unwrap();
        assert_eq!(fetcher.fetch_count("https://example.org/a").await, 2);
        assert_eq!(fetcher.fetch_count("https://example.org/b").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_url_not_found() {
        let fetcher = MockFetcher::default();
        let err = fetcher.fetch("https://example.org/missing").await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::NotFound("https://example.org/missing".into()));
        assert_eq!(fetcher.total_fetches().await, 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let fetcher = MockFetcher::with_pages([("https://example.org/a", "A")])
            .with_failure("https://example.org/a", ErrorKind::Status { url: "https://example.org/a".into(), status: 500 });
        let err = fetcher.fetch("https://example.org/a").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_redirect_reports_final_url() {
        let fetcher = MockFetcher::default().with_redirect("http://example.org/a", "https://example.org/a/", "A");
        let page = fetcher.fetch("http://example.org/a").await.unwrap();
        assert_eq!(page.url, "https://example.org/a/");
    }

    #[tokio::test]
    async fn test_delay() {
        let fetcher = MockFetcher::with_pages([("https://example.org/slow", "S")])
            .with_delay("https://example.org/slow", Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        fetcher.fetch("https://example.org/slow").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_insert_at_runtime() {
        let fetcher = MockFetcher::default();
        assert!(fetcher.fetch("https://example.org/late").await.is_err());
        fetcher.insert("https://example.org/late", "L").await;
        assert_eq!(fetcher.fetch("https://example.org/late").await.unwrap().body, "L");
    }
}
