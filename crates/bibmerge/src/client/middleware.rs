//! Shared HTTP client construction.
//!
//! Acquisition and publication use the same stack: a pooled `reqwest` client
//! wrapped in transient-failure retry with exponential backoff.

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{Config, api};

/// Build the retrying HTTP client described by `config`.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized.
pub fn build_client(config: &Config) -> reqwest::Result<ClientWithMiddleware> {
    let client = Client::builder()
        .user_agent(api::USER_AGENT)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .gzip(true)
        .build()?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_secs(1), Duration::from_secs(30))
        .build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
