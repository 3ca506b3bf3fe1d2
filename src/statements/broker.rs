//! Government data broker (API Entreprise) statements endpoint.
//!
//! Every call carries the static bearer token plus the `recipient`, `context`
//! and `object` parameters the broker requires for audit.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::time::Duration;

use super::{SourceKind, Statement, StatementLocator, StatementSource};
use crate::auth::{MissingConfiguration, SessionToken, StaticToken};
use crate::company::Siren;
use crate::company::fields::FieldAliases;
use crate::http::{HttpClient, JSON_TIMEOUT, RequestOptions};

pub const DEFAULT_BROKER_URL: &str = "https://entreprise.api.gouv.fr";
pub const DEFAULT_CONTEXT: &str = "Consultation des comptes annuels";
pub const DEFAULT_OBJECT: &str = "Analyse financiere d'entreprises voisines";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const STATEMENT_LIST: FieldAliases = FieldAliases(&["data.bilans", "bilans"]);

/// Audit parameters attached to every broker call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerParams {
    pub recipient: String,
    pub context: String,
    pub object: String,
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl BrokerParams {
    /// `recipient` is mandatory; blank `context`/`object` fall back to defaults.
    pub fn new(recipient: &str, context: Option<&str>, object: Option<&str>) -> Result<Self> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(MissingConfiguration::new(vec!["API_ENTREPRISE_RECIPIENT"]).into());
        }
        Ok(Self {
            recipient: recipient.to_string(),
            context: or_default(context, DEFAULT_CONTEXT),
            object: or_default(object, DEFAULT_OBJECT),
        })
    }

    fn options(&self, token: &str, timeout: Duration) -> RequestOptions {
        RequestOptions::new()
            .query("recipient", &self.recipient)
            .query("context", &self.context)
            .query("object", &self.object)
            .bearer(token)
            .timeout(timeout)
    }
}

pub struct BrokerSource {
    http_client: HttpClient,
    base_url: String,
    params: BrokerParams,
    session: SessionToken<StaticToken>,
}

impl BrokerSource {
    pub fn new(
        http_client: HttpClient,
        base_url: &str,
        token: StaticToken,
        params: BrokerParams,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            params,
            session: SessionToken::new(token),
        }
    }
}

#[async_trait]
impl StatementSource for BrokerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Broker
    }

    #[tracing::instrument(skip(self))]
    async fn list_statements(&self, siren: &Siren) -> Result<Vec<Statement>> {
        let url = format!(
            "{}/v3/inpi/rne/unites_legales/open_data/{}/actes_bilans",
            self.base_url, siren
        );
        debug!("Listing statements from {}...", url);

        let payload: Value = self
            .session
            .call(|token| {
                let url = url.clone();
                async move {
                    let options = self.params.options(&token, JSON_TIMEOUT);
                    self.http_client.get_json(&url, &options).await
                }
            })
            .await
            .with_context(|| format!("Failed to list statements for {}", siren))?;

        Ok(STATEMENT_LIST
            .list(&payload)
            .iter()
            .map(|item| Statement::from_value(item, SourceKind::Broker))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, statement: &Statement) -> Result<Vec<u8>> {
        let url = match &statement.locator {
            Some(StatementLocator::Url(url)) => url.clone(),
            Some(StatementLocator::Id(id)) => {
                bail!("Broker statement {} has no download URL", id)
            }
            None => bail!("Statement has neither identifier nor URL"),
        };

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
