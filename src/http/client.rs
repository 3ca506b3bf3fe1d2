//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::retry::{RetryPolicy, check_status, is_retryable_error, parse_json};

/// Default timeout for JSON API calls.
pub const JSON_TIMEOUT: Duration = Duration::from_secs(35);

/// Per-request knobs: query string, bearer token, timeout.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the authorization header once, outside the retry loop: a token that
    /// is not a valid header value will not become one on a later attempt.
    fn authorization(&self) -> Result<Option<HeaderValue>> {
        let Some(token) = &self.bearer else {
            return Ok(None);
        };
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("Bearer token contains invalid header characters")?;
        auth_value.set_sensitive(true);
        Ok(Some(auth_value))
    }

    fn apply(
        &self,
        mut request: RequestBuilder,
        authorization: Option<&HeaderValue>,
    ) -> RequestBuilder {
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        if let Some(auth_value) = authorization {
            request = request.header(AUTHORIZATION, auth_value.clone());
        }
        request.timeout(self.timeout.unwrap_or(JSON_TIMEOUT))
    }
}

/// HTTP client with built-in retry logic for network operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the back-off policy (tests use millisecond delays).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Performs a GET request and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, options))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        debug!("GET JSON from {} with query {:?}...", url, options.query);

        let authorization = options.authorization()?;
        self.with_retry("GET JSON", || async {
            let request = options.apply(self.client.get(url), authorization.as_ref());
            let response = request.send().await.context("Failed to send request")?;
            let response = check_status(response, url, &options.query).await?;

            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", url))?;
            parse_json(&text, status, url, &options.query)
        })
        .await
    }

    /// Performs a POST request with a JSON body and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, body, options))]
    pub async fn post_json<B, T>(&self, url: &str, body: &B, options: &RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("POST JSON to {}...", url);

        let authorization = options.authorization()?;
        self.with_retry("POST JSON", || async {
            let request = options.apply(self.client.post(url).json(body), authorization.as_ref());
            let response = request.send().await.context("Failed to send request")?;
            let response = check_status(response, url, &options.query).await?;

            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", url))?;
            parse_json(&text, status, url, &options.query)
        })
        .await
    }

    /// Downloads a resource fully into memory.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, options))]
    pub async fn download_bytes(&self, url: &str, options: &RequestOptions) -> Result<Vec<u8>> {
        debug!("Downloading {}...", url);

        let authorization = options.authorization()?;
        let bytes = self
            .with_retry("Download", || async {
                let request = options.apply(self.client.get(url), authorization.as_ref());
                let response = request
                    .send()
                    .await
                    .context("Failed to start download request")?;
                let response = check_status(response, url, &options.query).await?;

                let bytes = response
                    .bytes()
                    .await
                    .context("Failed to read download stream")?;
                Ok(bytes.to_vec())
            })
            .await?;

        debug!("Downloaded {:.2} KB", bytes.len() as f64 / 1024.0);
        Ok(bytes)
    }

    /// Executes an async operation with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt >= max_attempts {
                        warn!(
                            "{}: giving up after {} attempts ({})",
                            operation_name, attempt, e
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                        operation_name,
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Fast back-off for tests.
#[cfg(test)]
pub(crate) fn test_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: super::retry::MAX_ATTEMPTS,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}
