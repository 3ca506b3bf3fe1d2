//! Retry policy and response classification for outbound HTTP calls.

use reqwest::{Response, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// Maximum number of attempts (first call included) for network operations.
pub const MAX_ATTEMPTS: usize = 4;

/// Statuses worth another attempt.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Maximum number of characters of a non-JSON body kept in error messages.
pub const BODY_PREVIEW_CHARS: usize = 900;

/// Bounded exponential back-off between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.min_delay.saturating_mul(2u32.pow(exponent));
        delay.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Everything we know about a failed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFailure {
    pub status: u16,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub body: String,
}

impl fmt::Display for StatusFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} on {}", self.status, self.url)?;
        if !self.params.is_empty() {
            write!(f, " params={:?}", self.params)?;
        }
        if !self.body.is_empty() {
            write!(f, " body={}", self.body)?;
        }
        Ok(())
    }
}

/// Errors that should not be retried.
#[derive(Debug)]
pub enum NonRetryableError {
    /// HTTP 401, the credential holder may refresh and try once more
    Unauthorized(StatusFailure),
    /// Any other status >= 400 outside the transient set
    ClientError(StatusFailure),
    /// A successful status whose body is not the expected JSON
    InvalidResponse(StatusFailure),
}

impl NonRetryableError {
    pub fn failure(&self) -> &StatusFailure {
        match self {
            NonRetryableError::Unauthorized(failure)
            | NonRetryableError::ClientError(failure)
            | NonRetryableError::InvalidResponse(failure) => failure,
        }
    }
}

impl fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonRetryableError::Unauthorized(failure) => {
                write!(f, "Authentication failed: {}", failure)
            }
            NonRetryableError::ClientError(failure) => write!(f, "Request error: {}", failure),
            NonRetryableError::InvalidResponse(failure) => {
                write!(f, "Unexpected response: {}", failure)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// A rate-limit or server-side failure that may succeed on a later attempt.
#[derive(Debug)]
pub struct TransientError(pub StatusFailure);

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transient {}", self.0)
    }
}

impl std::error::Error for TransientError {}

/// Returns true if the error chain holds an HTTP 401.
pub fn is_unauthorized(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<NonRetryableError>(),
        Some(NonRetryableError::Unauthorized(_))
    )
}

/// Checks if an anyhow::Error is retryable.
pub(crate) fn is_retryable_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<NonRetryableError>().is_none()
}

/// Classifies a status code into the error it should raise, if any.
pub fn classify_status(status: StatusCode, failure: StatusFailure) -> anyhow::Error {
    if TRANSIENT_STATUSES.contains(&status.as_u16()) {
        anyhow::Error::from(TransientError(failure))
    } else if status == StatusCode::UNAUTHORIZED {
        anyhow::Error::from(NonRetryableError::Unauthorized(failure))
    } else {
        anyhow::Error::from(NonRetryableError::ClientError(failure))
    }
}

/// Passes successful responses through; turns statuses >= 400 into classified errors
/// carrying the URL, parameters and a preview of the body.
pub async fn check_status(
    response: Response,
    url: &str,
    params: &[(String, String)],
) -> anyhow::Result<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    let text = response.text().await.unwrap_or_default();

    let failure = StatusFailure {
        status: status.as_u16(),
        url: url.to_string(),
        params: params.to_vec(),
        body: body_preview(&text, is_json),
    };
    Err(classify_status(status, failure))
}

/// Deserializes a successful body. A body that does not parse will not parse on
/// the next attempt either, so the error is typed non-retryable.
pub(crate) fn parse_json<T: DeserializeOwned>(
    text: &str,
    status: StatusCode,
    url: &str,
    params: &[(String, String)],
) -> anyhow::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        let failure = StatusFailure {
            status: status.as_u16(),
            url: url.to_string(),
            params: params.to_vec(),
            body: shorten(text, BODY_PREVIEW_CHARS),
        };
        anyhow::Error::from(NonRetryableError::InvalidResponse(failure))
            .context(format!("Failed to parse JSON response from {}: {}", url, e))
    })
}

/// JSON bodies are kept whole (re-serialised compactly), text is truncated.
pub fn body_preview(text: &str, is_json: bool) -> String {
    if is_json && let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return value.to_string();
    }
    shorten(text, BODY_PREVIEW_CHARS)
}

fn shorten(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
