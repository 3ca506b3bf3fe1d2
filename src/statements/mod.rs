//! Annual financial statements ("bilans") published for a company.
//!
//! Two upstreams can serve them: the national companies registry (login with
//! username/password, statements addressed by id) and the data broker (static
//! bearer token, statements addressed by direct URL). Both implement
//! [`StatementSource`].

mod broker;
mod rne;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::company::Siren;
use crate::company::fields::FieldAliases;

pub use broker::{BrokerParams, BrokerSource, DEFAULT_BROKER_URL};
pub use rne::{RneEnvironment, RneSource};

const LOCATOR_ID: FieldAliases = FieldAliases(&["id", "identifiant"]);
const LOCATOR_URL: FieldAliases = FieldAliases(&["url", "download_url", "lien"]);
const CLOSING_DATE: FieldAliases = FieldAliases(&[
    "dateCloture",
    "date_cloture",
    "date_cloture_exercice",
]);
const FILING_DATE: FieldAliases = FieldAliases(&["dateDepot", "date_depot"]);
const CONFIDENTIALITY: FieldAliases =
    FieldAliases(&["confidentiality", "confidentialite", "type_diffusion"]);
const DELETED: FieldAliases = FieldAliases(&["deleted", "supprime"]);
/// Broker items may wrap their attributes in a `data` object.
const ENVELOPE: FieldAliases = FieldAliases(&["data"]);

/// How a statement's PDF is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementLocator {
    Id(String),
    Url(String),
}

impl StatementLocator {
    /// Short, path-safe label for diagnostics file names.
    pub fn label(&self) -> String {
        let raw = match self {
            StatementLocator::Id(id) => id.as_str(),
            StatementLocator::Url(url) => url
                .split('?')
                .next()
                .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
                .unwrap_or(url.as_str()),
        };
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(64)
            .collect()
    }
}

/// One financial-statement descriptor from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    pub locator: Option<StatementLocator>,
    pub closing_date: Option<String>,
    pub filing_date: Option<String>,
    pub confidentiality: Option<String>,
    pub deleted: bool,
}

impl Statement {
    /// Reads one listing entry, resolving field aliases. The registry addresses
    /// PDFs by id (a URL is accepted as fallback); the broker only by URL, so a
    /// broker entry with an id alone has no locator.
    pub fn from_value(item: &Value, kind: SourceKind) -> Self {
        let item = ENVELOPE
            .value(item)
            .filter(|inner| inner.is_object())
            .unwrap_or(item);

        let by_id = || LOCATOR_ID.text(item).map(StatementLocator::Id);
        let by_url = || LOCATOR_URL.text(item).map(StatementLocator::Url);
        let locator = match kind {
            SourceKind::Rne => by_id().or_else(by_url),
            SourceKind::Broker => by_url(),
        };

        Self {
            locator,
            closing_date: CLOSING_DATE.text(item),
            filing_date: FILING_DATE.text(item),
            confidentiality: CONFIDENTIALITY.text(item),
            deleted: DELETED.flag(item).unwrap_or(false),
        }
    }

    /// Not deleted and reachable.
    pub fn is_downloadable(&self) -> bool {
        !self.deleted && self.locator.is_some()
    }

    /// `statement_{closing}_filed_{filing}_{confidentiality}.pdf`, path-safe.
    pub fn file_name(&self) -> String {
        let name = format!(
            "statement_{}_filed_{}_{}.pdf",
            self.closing_date.as_deref().unwrap_or("unknown-date"),
            self.filing_date.as_deref().unwrap_or("unknown-filing"),
            self.confidentiality.as_deref().unwrap_or("Unknown"),
        );
        name.replace(' ', "_").replace(['/', '\\'], "-")
    }

    pub fn label(&self) -> String {
        self.locator
            .as_ref()
            .map(StatementLocator::label)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Drops deleted entries and entries without identifier or URL.
pub fn downloadable(statements: Vec<Statement>) -> Vec<Statement> {
    statements
        .into_iter()
        .filter(Statement::is_downloadable)
        .collect()
}

/// Which upstream serves the statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rne,
    Broker,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rne => write!(f, "rne"),
            SourceKind::Broker => write!(f, "broker"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rne" | "inpi" => Ok(SourceKind::Rne),
            "broker" | "api-entreprise" => Ok(SourceKind::Broker),
            _ => anyhow::bail!("Unknown statements provider: {}. Expected rne or broker.", s),
        }
    }
}

/// Listing and download of financial statements for one upstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatementSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Every statement descriptor published for the company, deleted ones included.
    async fn list_statements(&self, siren: &Siren) -> Result<Vec<Statement>>;

    /// Raw PDF bytes of one statement.
    async fn download(&self, statement: &Statement) -> Result<Vec<u8>>;

    /// Forces a credential refresh; returns the token length.
    async fn check_login(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_registry_shape() {
        let statement = Statement::from_value(
            &json!({
                "id": "65a1b2",
                "url": "https://registry.example/ignored.pdf",
                "dateCloture": "2022-12-31",
                "dateDepot": "2023-06-30",
                "confidentiality": "Public",
                "deleted": false
            }),
            SourceKind::Rne,
        );
        assert_eq!(statement.locator, Some(StatementLocator::Id("65a1b2".into())));
        assert_eq!(statement.closing_date.as_deref(), Some("2022-12-31"));
        assert!(statement.is_downloadable());
        assert_eq!(
            statement.file_name(),
            "statement_2022-12-31_filed_2023-06-30_Public.pdf"
        );
    }

    #[test]
    fn test_from_value_broker_envelope() {
        let statement = Statement::from_value(
            &json!({
                "data": {
                    "id": "abc123",
                    "url": "https://storage.example/bilans/abc.pdf?sig=1",
                    "date_cloture_exercice": "2021-12-31",
                    "date_depot": "2022-05-02"
                }
            }),
            SourceKind::Broker,
        );
        assert_eq!(
            statement.locator,
            Some(StatementLocator::Url("https://storage.example/bilans/abc.pdf?sig=1".into()))
        );
        assert_eq!(statement.label(), "abc_pdf");
        assert_eq!(
            statement.file_name(),
            "statement_2021-12-31_filed_2022-05-02_Unknown.pdf"
        );
    }

    #[test]
    fn test_downloadable_filters_deleted_and_unreachable() {
        let statements = vec![
            Statement::from_value(&json!({"id": "a"}), SourceKind::Rne),
            Statement::from_value(&json!({"id": "b", "deleted": true}), SourceKind::Rne),
            Statement::from_value(&json!({"id": "  "}), SourceKind::Rne),
            Statement::from_value(&json!({"dateCloture": "2020-12-31"}), SourceKind::Rne),
        ];
        let kept = downloadable(statements);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label(), "a");
    }

    #[test]
    fn test_downloadable_drops_broker_entries_with_id_only() {
        let statements = vec![
            Statement::from_value(&json!({"data": {"id": "only-id"}}), SourceKind::Broker),
            Statement::from_value(
                &json!({"data": {"id": "both", "url": "https://storage.example/b.pdf"}}),
                SourceKind::Broker,
            ),
        ];
        let kept = downloadable(statements);
        assert_eq!(kept.len(), 1);
        assert_eq!(
            kept[0].locator,
            Some(StatementLocator::Url("https://storage.example/b.pdf".into()))
        );
    }

    #[test]
    fn test_file_name_is_path_safe() {
        let statement = Statement {
            locator: Some(StatementLocator::Id("x".into())),
            closing_date: Some("31/12/2022".into()),
            filing_date: None,
            confidentiality: Some("Partially confidential".into()),
            deleted: false,
        };
        assert_eq!(
            statement.file_name(),
            "statement_31-12-2022_filed_unknown-filing_Partially_confidential.pdf"
        );
    }

    #[test]
    fn test_source_kind_parse_and_display() {
        assert_eq!("rne".parse::<SourceKind>().unwrap(), SourceKind::Rne);
        assert_eq!("INPI".parse::<SourceKind>().unwrap(), SourceKind::Rne);
        assert_eq!("broker".parse::<SourceKind>().unwrap(), SourceKind::Broker);
        assert!("other".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::Broker.to_string(), "broker");
    }
}
