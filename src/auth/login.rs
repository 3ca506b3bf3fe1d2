//! Username/password login against the national companies registry.

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use super::{MissingConfiguration, TokenSource};
use crate::http::{HttpClient, JSON_TIMEOUT, RequestOptions};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// `POST {base}/api/sso/login` with `{username, password}`, answering `{token}`.
pub struct RneLogin {
    http_client: HttpClient,
    base_url: String,
    username: String,
    password: String,
}

impl RneLogin {
    /// Fails immediately when either credential is blank.
    pub fn new(http_client: HttpClient, base_url: &str, username: &str, password: &str) -> Result<Self> {
        let mut missing = Vec::new();
        if username.trim().is_empty() {
            missing.push("INPI_USERNAME");
        }
        if password.trim().is_empty() {
            missing.push("INPI_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(MissingConfiguration::new(missing).into());
        }

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        })
    }
}

#[async_trait]
impl TokenSource for RneLogin {
    #[tracing::instrument(skip(self))]
    async fn acquire(&self) -> Result<String> {
        let url = format!("{}/api/sso/login", self.base_url);
        info!("Logging in to {}...", self.base_url);

        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };
        let response: LoginResponse = self
            .http_client
            .post_json(&url, &body, &RequestOptions::new().timeout(JSON_TIMEOUT))
            .await?;

        let token = response.token.unwrap_or_default().trim().to_string();
        if token.is_empty() {
            bail!("Login succeeded but the response carries no token");
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_policy;
    use mockito::Matcher;
    use reqwest::Client;

    fn http() -> HttpClient {
        HttpClient::new(Client::new()).with_retry_policy(test_policy())
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = RneLogin::new(http(), "http://localhost", "", " ").err().unwrap();
        let missing = err.downcast_ref::<MissingConfiguration>().unwrap();
        assert_eq!(missing.variables, vec!["INPI_USERNAME", "INPI_PASSWORD"]);

        let err = RneLogin::new(http(), "http://localhost", "user", "").err().unwrap();
        assert!(err.to_string().contains("INPI_PASSWORD"));
        assert!(!err.to_string().contains("INPI_USERNAME"));
    }

    #[tokio::test]
    async fn test_acquire_posts_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/sso/login")
            .match_body(Matcher::Json(serde_json::json!({
                "username": "alice",
                "password": "s3cret"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "jwt-value"}"#)
            .create_async()
            .await;

        let login = RneLogin::new(http(), &format!("{}/", server.url()), "alice", "s3cret").unwrap();
        let token = login.acquire().await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "jwt-value");
    }

    #[tokio::test]
    async fn test_acquire_rejects_blank_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/sso/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "  "}"#)
            .create_async()
            .await;

        let login = RneLogin::new(http(), &server.url(), "alice", "s3cret").unwrap();
        let err = login.acquire().await.unwrap_err();
        assert!(err.to_string().contains("no token"));
    }

    #[tokio::test]
    async fn test_acquire_wrong_password_is_final() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/sso/login")
            .with_status(403)
            .with_body("bad credentials")
            .expect(1)
            .create_async()
            .await;

        let login = RneLogin::new(http(), &server.url(), "alice", "wrong").unwrap();
        let err = login.acquire().await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("HTTP 403"));
    }
}
