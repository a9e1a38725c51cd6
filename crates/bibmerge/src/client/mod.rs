//! Source acquisition.
//!
//! Provides async HTTP fetching with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff
//! - gzip transfer decoding
//!
//! The pipeline only sees the [`SourceFetcher`] trait, so tests and other
//! transports can stand in for [`HttpFetcher`].

mod middleware;

use std::fmt;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;

pub use middleware::build_client;

use crate::config::Config;
use crate::error::{FetchError, FetchResult};

/// Fetches the full text behind a URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url`. Any non-success outcome is a [`FetchError`].
    async fn fetch(&self, url: &str) -> FetchResult<String>;
}

/// HTTP(S) fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> FetchResult<Self> {
        Ok(Self { client: build_client(config)? })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn with_client(client: ClientWithMiddleware) -> Self {
        Self { client }
    }

    /// Handle response status codes.
    async fn handle_response(
        url: &str,
        response: reqwest::Response,
    ) -> FetchResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            404 | 410 => Err(FetchError::not_found(url)),
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(FetchError::server(url, status.as_u16(), text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(FetchError::UnexpectedStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        tracing::debug!(url, "Fetching source");

        let response = self.client.get(url).send().await?;
        let response = Self::handle_response(url, response).await?;
        let text = response.text().await?;

        tracing::debug!(url, bytes = text.len(), "Fetched source");
        Ok(text)
    }
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}
