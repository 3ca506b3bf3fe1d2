use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::{
    archive::{ArchiveOptions, MAX_SELECTED, StatementsArchive, build_statements_zip},
    company::{SelectedCompany, Siren},
    runtime::Runtime,
    session::Session,
    statements::{SourceKind, StatementSource},
};

use super::config::Config;
use super::services::{build_http_client, build_source};

pub const DEFAULT_OUTPUT: &str = "annual_accounts.zip";

/// What `bilans download` was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Explicit identifiers; the session selection is used when empty
    pub sirens: Vec<String>,
    pub output: PathBuf,
    pub provider: SourceKind,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            sirens: Vec::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            provider: SourceKind::default(),
        }
    }
}

/// Build the statements ZIP for the selected companies
#[tracing::instrument(skip(runtime, config))]
pub async fn download<R: Runtime + ?Sized>(
    runtime: &R,
    config: &Config,
    options: DownloadOptions,
) -> Result<()> {
    let companies = resolve_companies(runtime, config, &options.sirens)?;
    let source = build_source(config, options.provider, build_http_client()?)?;

    run_download(
        runtime,
        source.as_ref(),
        &companies,
        &options.output,
        ArchiveOptions::default(),
    )
    .await?;
    Ok(())
}

/// Explicit identifiers win over the session selection. Names come from the
/// session when known.
fn resolve_companies<R: Runtime + ?Sized>(
    runtime: &R,
    config: &Config,
    sirens: &[String],
) -> Result<Vec<SelectedCompany>> {
    let session = match Session::load_or_default(runtime, &config.session_path) {
        Ok(session) => session,
        Err(e) if !sirens.is_empty() => {
            warn!("Ignoring unreadable session: {:#}", e);
            Session::default()
        }
        Err(e) => return Err(e),
    };

    if sirens.is_empty() {
        let companies = session.selected_companies();
        if companies.is_empty() {
            bail!("No company selected; run `bilans select <SIREN>...` or pass --siren");
        }
        return Ok(companies);
    }

    let mut companies: Vec<SelectedCompany> = Vec::new();
    for raw in sirens {
        let siren: Siren = raw.parse()?;
        if companies.iter().any(|c| c.siren == siren) {
            continue;
        }
        let name = session
            .find(&siren)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        companies.push(SelectedCompany { siren, name });
    }
    if companies.len() > MAX_SELECTED {
        warn!(
            "{} companies given, keeping the first {}",
            companies.len(),
            MAX_SELECTED
        );
        companies.truncate(MAX_SELECTED);
    }
    Ok(companies)
}

pub(crate) async fn run_download<R, S>(
    runtime: &R,
    source: &S,
    companies: &[SelectedCompany],
    output: &Path,
    archive_options: ArchiveOptions,
) -> Result<StatementsArchive>
where
    R: Runtime + ?Sized,
    S: StatementSource + ?Sized,
{
    println!(
        "Fetching statements for {} company(ies) from {}...",
        companies.len(),
        source.kind()
    );
    let archive = build_statements_zip(source, companies, archive_options).await?;

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !runtime.exists(parent)
    {
        runtime.create_dir_all(parent)?;
    }
    runtime
        .write(output, &archive.bytes)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    debug!("Wrote {} bytes", archive.bytes.len());

    for report in &archive.companies {
        match &report.listing_error {
            Some(error) => println!("  {}: listing failed ({})", report.folder, error),
            None if report.failed > 0 => println!(
                "  {}: {} PDF(s), {} failed",
                report.folder, report.downloaded, report.failed
            ),
            None => println!("  {}: {} PDF(s)", report.folder, report.downloaded),
        }
    }
    println!(
        "Saved {} ({} PDF(s))",
        output.display(),
        archive.pdf_count()
    );
    Ok(archive)
}
