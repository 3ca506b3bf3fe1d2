//! HTTP client module with retry logic and error handling.

mod client;
mod retry;

pub use client::{HttpClient, JSON_TIMEOUT, RequestOptions};
pub use retry::{
    MAX_ATTEMPTS, NonRetryableError, RetryPolicy, StatusFailure, TransientError, is_unauthorized,
};

#[cfg(test)]
pub(crate) use client::test_policy;
