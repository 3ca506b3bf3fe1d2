//! Service factory for building command dependencies.
//!
//! Clients are built from [`Config`] values but are not part of the
//! configuration itself. Credentials are checked here, before anything
//! touches the network.

use anyhow::Result;
use log::debug;
use reqwest::Client;

use crate::{
    auth::{MissingConfiguration, RneLogin, StaticToken},
    company::SearchClient,
    geo::BanClient,
    http::HttpClient,
    statements::{BrokerParams, BrokerSource, RneSource, SourceKind, StatementSource},
};

use super::config::Config;

/// Build the shared HTTP client
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(concat!("bilans-cli/", env!("BILANS_VERSION")))
        .build()?;
    Ok(HttpClient::new(client))
}

/// Build the address (geocoding) client
pub fn build_geocoder(config: &Config, http_client: HttpClient) -> BanClient {
    BanClient::new(http_client, &config.address_url)
}

/// Build the company search client
pub fn build_directory(config: &Config, http_client: HttpClient) -> SearchClient {
    SearchClient::new(http_client, &config.search_url)
}

/// Build the statements source for `kind`. Fails with [`MissingConfiguration`]
/// when its credentials are not set.
pub fn build_source(
    config: &Config,
    kind: SourceKind,
    http_client: HttpClient,
) -> Result<Box<dyn StatementSource>> {
    let missing = config.missing_for(kind);
    if !missing.is_empty() {
        return Err(MissingConfiguration::new(missing).into());
    }
    debug!("Using {} statements source", kind);

    let source: Box<dyn StatementSource> = match kind {
        SourceKind::Rne => {
            let login = RneLogin::new(
                http_client.clone(),
                &config.rne_url,
                config.rne_username.as_deref().unwrap_or_default(),
                config.rne_password.as_deref().unwrap_or_default(),
            )?;
            Box::new(RneSource::new(http_client, &config.rne_url, login))
        }
        SourceKind::Broker => {
            let token = StaticToken::new(config.broker_token.as_deref().unwrap_or_default())?;
            let params = BrokerParams::new(
                config.broker_recipient.as_deref().unwrap_or_default(),
                config.broker_context.as_deref(),
                config.broker_object.as_deref(),
            )?;
            Box::new(BrokerSource::new(
                http_client,
                &config.broker_url,
                token,
                params,
            ))
        }
    };
    Ok(source)
}
