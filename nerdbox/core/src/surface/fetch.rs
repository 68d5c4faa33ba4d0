//! Fetchers
//!
//! [`HttpFetcher`] performs a real GET with `reqwest`; [`StaticFetcher`]
//! serves bodies from memory for headless pages and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Url};

use super::{FetchError, Fetcher};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP [`Fetcher`]
///
/// Relative references are joined onto the base URL when one is set;
/// without a base URL they are rejected as [`FetchError::InvalidUrl`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Option<Url>,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Resolve relative references against `base`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `base` is not an absolute URL.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, FetchError> {
        let url = Url::parse(base).map_err(|e| invalid_url(base, &e))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Turn a reference into an absolute URL
    fn resolve_url(&self, reference: &str) -> Result<Url, FetchError> {
        let joined = match &self.base_url {
            Some(base) => base.join(reference),
            None => Url::parse(reference),
        };
        joined.map_err(|e| invalid_url(reference, &e))
    }
}

fn invalid_url(url: &str, reason: &impl std::fmt::Display) -> FetchError {
    FetchError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let target = self.resolve_url(url)?;
        tracing::debug!(url = %target, "Fetching remote content");

        let response = self.client.get(target.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// In-memory [`Fetcher`]
///
/// Unknown URLs fail with [`FetchError::NotFound`], which exercises the same
/// path as a network failure.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    bodies: RwLock<HashMap<String, String>>,
}

impl StaticFetcher {
    /// Create an empty fetcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticFetcher::insert`]
    #[must_use]
    pub fn with(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    /// Serve `body` for `url`
    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.bodies.write().insert(url.into(), body.into());
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.bodies
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher_serves_registered_bodies() {
        let fetcher = StaticFetcher::new().with("support/fragment.html", "<p>remote</p>");
        assert_eq!(
            fetcher.fetch("support/fragment.html").await.unwrap(),
            "<p>remote</p>"
        );
    }

    #[tokio::test]
    async fn test_static_fetcher_missing_url_is_not_found() {
        let fetcher = StaticFetcher::new();
        let err = fetcher.fetch("missing.html").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(ref url) if url == "missing.html"));
    }

    #[test]
    fn test_http_fetcher_resolves_relative_against_base() {
        let fetcher = HttpFetcher::new()
            .unwrap()
            .with_base_url("http://localhost:8080/docs/")
            .unwrap();
        let url = fetcher.resolve_url("support/fragment.html").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/docs/support/fragment.html");
    }

    #[test]
    fn test_http_fetcher_rejects_relative_without_base() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.resolve_url("support/fragment.html").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpFetcher::new().unwrap().with_base_url("not a url");
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }
}
