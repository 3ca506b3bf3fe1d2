use anyhow::Result;

use crate::statements::{SourceKind, StatementSource};

use super::config::Config;
use super::services::{build_http_client, build_source};

/// Force a fresh credential and report it (never prints the token itself)
#[tracing::instrument(skip(config))]
pub async fn login(config: &Config, provider: SourceKind) -> Result<()> {
    let source = build_source(config, provider, build_http_client()?)?;
    report_login(source.as_ref()).await
}

async fn report_login<S: StatementSource + ?Sized>(source: &S) -> Result<()> {
    let length = source.check_login().await?;
    println!(
        "Login to {} succeeded (token of {} characters)",
        source.kind(),
        length
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::MockStatementSource;

    #[tokio::test]
    async fn test_report_login_forces_refresh() {
        let mut source = MockStatementSource::new();
        source.expect_check_login().times(1).returning(|| Ok(42));
        source.expect_kind().return_const(SourceKind::Broker);

        report_login(&source).await.unwrap();
    }

    #[tokio::test]
    async fn test_report_login_propagates_failure() {
        let mut source = MockStatementSource::new();
        source
            .expect_check_login()
            .returning(|| Err(anyhow::anyhow!("Login succeeded but the response carries no token")));
        source.expect_kind().never();

        let err = report_login(&source).await.unwrap_err();
        assert!(err.to_string().contains("no token"));
    }
}
