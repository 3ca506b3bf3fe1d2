//! Client for the public business-registry search API.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;

use super::fields;
use crate::http::{HttpClient, JSON_TIMEOUT, RequestOptions};

pub const DEFAULT_SEARCH_URL: &str = "https://recherche-entreprises.api.gouv.fr";

/// Page size ceiling imposed by the upstream API.
pub const MAX_PER_PAGE: u32 = 25;

const SEARCH_TTL: Duration = Duration::from_secs(20 * 60);

/// One page request against the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub postcode: Option<String>,
    pub naf: Option<String>,
    pub text: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl SearchQuery {
    pub fn by_postcode(postcode: &str) -> Self {
        Self {
            postcode: Some(postcode.to_string()),
            naf: None,
            text: None,
            page: 1,
            per_page: MAX_PER_PAGE,
        }
    }

    /// Page size clamped to `1..=MAX_PER_PAGE`.
    pub fn effective_per_page(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    fn options(&self) -> RequestOptions {
        let mut options = RequestOptions::new().timeout(JSON_TIMEOUT);
        for (key, value) in [
            ("code_postal", &self.postcode),
            ("code_naf", &self.naf),
            ("q", &self.text),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                options = options.query(key, value);
            }
        }
        options
            .query("page", self.page.max(1))
            .query("per_page", self.effective_per_page())
    }

    fn cache_key(&self) -> String {
        self.options()
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Raw search hits for one page.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Value>>;
}

/// Search client with a short-lived result cache.
pub struct SearchClient {
    http_client: HttpClient,
    base_url: String,
    cache: Cache<String, Vec<Value>>,
}

impl SearchClient {
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Cache::builder()
                .time_to_live(SEARCH_TTL)
                .max_capacity(1_000)
                .build(),
        }
    }
}

#[async_trait]
impl CompanyDirectory for SearchClient {
    #[tracing::instrument(skip(self))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let key = query.cache_key();
        if let Some(hits) = self.cache.get(&key).await {
            debug!("Search cache hit for {}", key);
            return Ok(hits);
        }

        let url = format!("{}/search", self.base_url);
        let payload: Value = self.http_client.get_json(&url, &query.options()).await?;
        let hits = fields::RESULT_LIST.list(&payload).to_vec();
        debug!("Search page {} returned {} hit(s)", query.page, hits.len());

        self.cache.insert(key, hits.clone()).await;
        Ok(hits)
    }
}
