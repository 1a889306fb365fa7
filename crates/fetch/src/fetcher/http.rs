//! HTTP transport.

use super::Fetcher;
use crate::Page;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode, Url, header};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

/// Fetches pages over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    name: String,
    client: Client,
}
impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/html,application/xhtml+xml"));
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .or_raise(|| ErrorKind::Setup("could not build HTTP client".to_string()))?;
        Ok(Self { name: "http".to_string(), client })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn classify(url: &str, err: &reqwest::Error) -> ErrorKind {
        if err.is_timeout() {
            ErrorKind::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            Self::status(url, status)
        } else {
            ErrorKind::Network { url: url.to_string(), cause: err.to_string() }
        }
    }

    fn status(url: &str, status: StatusCode) -> ErrorKind {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::NotFound(url.to_string()),
            _ => ErrorKind::Status { url: url.to_string(), status: status.as_u16() },
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(fetcher = %self.name))]
    async fn fetch(&self, url: &str) -> Result<Page> {
        let target = Url::parse(url).or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        let response = match self.client.get(target).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = Self::classify(url, &err);
                return Err(exn::Exn::from(err).raise(kind));
            },
        };
        let status = response.status();
        if !status.is_success() {
            exn::bail!(Self::status(url, status));
        }
        let final_url = response.url().to_string();
        let body = response.text().await.or_raise(|| ErrorKind::Body(url.to_string()))?;
        debug!(final_url = %final_url, bytes = body.len(), "fetched page");
        Ok(Page::new(final_url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_relative_url() {
        let fetcher = HttpFetcher::new("memex-test", DEFAULT_TIMEOUT).unwrap();
        let err = fetcher.fetch("/memes/doge").await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidUrl("/memes/doge".to_string()));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(HttpFetcher::status("u", StatusCode::NOT_FOUND), ErrorKind::NotFound("u".into()));
        assert_eq!(
            HttpFetcher::status("u", StatusCode::BAD_GATEWAY),
            ErrorKind::Status { url: "u".into(), status: 502 }
        );
    }
}
