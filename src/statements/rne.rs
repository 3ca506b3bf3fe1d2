//! National companies registry (RNE) attachments API.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::{SourceKind, Statement, StatementLocator, StatementSource};
use crate::auth::{RneLogin, SessionToken};
use crate::company::Siren;
use crate::company::fields::FieldAliases;
use crate::http::{HttpClient, JSON_TIMEOUT, RequestOptions};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// `bilans` holds the PDF descriptors; `bilansSaisis` (structured data) is ignored.
const STATEMENT_LIST: FieldAliases = FieldAliases(&["bilans"]);

/// Registry deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RneEnvironment {
    #[default]
    Production,
    PreProduction,
}

impl RneEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            RneEnvironment::Production => "https://registre-national-entreprises.inpi.fr",
            RneEnvironment::PreProduction => "https://registre-national-entreprises-pprod.inpi.fr",
        }
    }
}

impl fmt::Display for RneEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RneEnvironment::Production => write!(f, "prod"),
            RneEnvironment::PreProduction => write!(f, "pprod"),
        }
    }
}

impl FromStr for RneEnvironment {
    type Err = anyhow::Error;

    /// Anything other than `pprod` selects production.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pprod" => Ok(RneEnvironment::PreProduction),
            _ => Ok(RneEnvironment::Production),
        }
    }
}

pub struct RneSource {
    http_client: HttpClient,
    base_url: String,
    session: SessionToken<RneLogin>,
}

impl RneSource {
    pub fn new(http_client: HttpClient, base_url: &str, login: RneLogin) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: SessionToken::new(login),
        }
    }

    fn download_url(&self, locator: &StatementLocator) -> String {
        match locator {
            StatementLocator::Id(id) => format!("{}/api/bilans/{}/download", self.base_url, id),
            StatementLocator::Url(url) => url.clone(),
        }
    }
}

#[async_trait]
impl StatementSource for RneSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Rne
    }

    #[tracing::instrument(skip(self))]
    async fn list_statements(&self, siren: &Siren) -> Result<Vec<Statement>> {
        let url = format!("{}/api/companies/{}/attachments", self.base_url, siren);
        debug!("Listing attachments from {}...", url);

        let payload: Value = self
            .session
            .call(|token| {
                let url = url.clone();
                async move {
                    let options = RequestOptions::new().bearer(&token).timeout(JSON_TIMEOUT);
                    self.http_client.get_json(&url, &options).await
                }
            })
            .await
            .with_context(|| format!("Failed to list attachments for {}", siren))?;

        Ok(STATEMENT_LIST
            .list(&payload)
            .iter()
            .map(|item| Statement::from_value(item, SourceKind::Rne))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, statement: &Statement) -> Result<Vec<u8>> {
        let locator = statement
            .locator
            .as_ref()
            .ok_or_else(|| anyhow!("Statement has neither identifier nor URL"))?;
        let url = self.download_url(locator);

        self.session
            .call(|token| {
                let url = url.clone();
                async move {
                    let options = RequestOptions::new()
                        .bearer(&token)
                        .timeout(DOWNLOAD_TIMEOUT);
                    self.http_client.download_bytes(&url, &options).await
                }
            })
            .await
            .with_context(|| format!("Failed to download statement {}", statement.label()))
    }

    async fn check_login(&self) -> Result<usize> {
        Ok(self.session.token(true).await?.len())
    }
}
