//! Bearer credentials for the authenticated statement APIs.
//!
//! A [`TokenSource`] knows how to obtain a token (a login call, or a statically
//! configured value). [`SessionToken`] caches it for the session and wraps
//! authenticated calls so that a single 401 triggers one refresh and one retry.

mod login;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use crate::http::is_unauthorized;

pub use login::RneLogin;

/// Raised before any network call when required settings are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingConfiguration {
    pub variables: Vec<&'static str>,
}

impl MissingConfiguration {
    pub fn new(variables: Vec<&'static str>) -> Self {
        Self { variables }
    }
}

impl fmt::Display for MissingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing configuration: {}", self.variables.join(", "))
    }
}

impl std::error::Error for MissingConfiguration {}

/// Something able to produce a bearer token for one upstream API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh token.
    async fn acquire(&self) -> Result<String>;
}

/// A token configured up front; there is no login step.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MissingConfiguration::new(vec!["API_ENTREPRISE_TOKEN"]).into());
        }
        Ok(Self {
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn acquire(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Session-scoped token cache with refresh-once-on-401 semantics.
pub struct SessionToken<S: TokenSource> {
    source: S,
    cached: Mutex<Option<String>>,
}

impl<S: TokenSource> SessionToken<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached token, acquiring one when forced or when none is cached.
    #[tracing::instrument(skip(self))]
    pub async fn token(&self, force: bool) -> Result<String> {
        if !force && let Some(token) = self.cached_token() {
            return Ok(token);
        }

        debug!("Acquiring a new bearer token...");
        let token = self.source.acquire().await?;
        self.store(Some(token.clone()));
        debug!("Bearer token acquired ({} chars)", token.len());
        Ok(token)
    }

    /// Drops the cached token so the next call re-authenticates.
    pub fn invalidate(&self) {
        self.store(None);
    }

    /// Runs an authenticated operation. On a first 401 the token is refreshed and the
    /// operation is retried exactly once; a second 401 is returned to the caller.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.token(false).await?;
        match operation(token).await {
            Err(e) if is_unauthorized(&e) => {
                warn!("Upstream rejected the bearer token, re-authenticating once");
                self.invalidate();
                let token = self.token(true).await?;
                operation(token).await
            }
            other => other,
        }
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store(&self, token: Option<String>) {
        *self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{NonRetryableError, StatusFailure};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unauthorized() -> anyhow::Error {
        NonRetryableError::Unauthorized(StatusFailure {
            status: 401,
            url: "http://localhost/api".into(),
            params: vec![],
            body: String::new(),
        })
        .into()
    }

    fn counting_source(counter: Arc<AtomicUsize>) -> MockTokenSource {
        let mut source = MockTokenSource::new();
        source.expect_acquire().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        });
        source
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let session = SessionToken::new(counting_source(acquired.clone()));

        assert_eq!(session.token(false).await.unwrap(), "token-1");
        assert_eq!(session.token(false).await.unwrap(), "token-1");
        assert_eq!(acquired.load(Ordering::SeqCst), 1);

        assert_eq!(session.token(true).await.unwrap(), "token-2");
        assert_eq!(acquired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_refreshes_once_on_unauthorized() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let session = SessionToken::new(counting_source(acquired.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let result = session
            .call(|token| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(unauthorized())
                    } else {
                        Ok(token)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(acquired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_second_unauthorized_propagates() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let session = SessionToken::new(counting_source(acquired.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<()> = session
            .call(|_token| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unauthorized())
                }
            })
            .await;

        assert!(is_unauthorized(&result.unwrap_err()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(acquired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_other_errors_do_not_refresh() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let session = SessionToken::new(counting_source(acquired.clone()));

        let result: Result<()> = session
            .call(|_token| async { Err(anyhow::anyhow!("boom")) })
            .await;

        assert!(result.is_err());
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_propagates() {
        let mut source = MockTokenSource::new();
        source
            .expect_acquire()
            .returning(|| Err(MissingConfiguration::new(vec!["INPI_USERNAME"]).into()));
        let session = SessionToken::new(source);

        let err = session.token(false).await.unwrap_err();
        assert!(err.downcast_ref::<MissingConfiguration>().is_some());
    }

    #[test]
    fn test_static_token_requires_value() {
        let err = StaticToken::new("  ").err().unwrap();
        assert!(err.to_string().contains("API_ENTREPRISE_TOKEN"));
    }

    #[tokio::test]
    async fn test_static_token_returns_value() {
        let source = StaticToken::new(" abc ").unwrap();
        assert_eq!(source.acquire().await.unwrap(), "abc");
    }

    #[test]
    fn test_missing_configuration_display() {
        let err = MissingConfiguration::new(vec!["INPI_USERNAME", "INPI_PASSWORD"]);
        assert_eq!(
            err.to_string(),
            "Missing configuration: INPI_USERNAME, INPI_PASSWORD"
        );
    }
}
