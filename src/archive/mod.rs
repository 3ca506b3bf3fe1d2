//! Assembly of the annual-statements ZIP archive.
//!
//! One directory per company. Failures are isolated: a company whose listing
//! fails gets an error note, a statement whose download fails gets its own
//! error note, and the rest of the batch carries on.

mod zip;

use anyhow::Result;
use log::{info, warn};
use std::time::Duration;

use crate::company::SelectedCompany;
use crate::statements::{Statement, StatementSource, downloadable};

pub use self::zip::MemoryZip;

/// Maximum number of companies in one archive.
pub const MAX_SELECTED: usize = 5;

/// Pause before each PDF download to stay under upstream rate limits.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);

const MAX_FOLDER_NAME_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub throttle: Duration,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
        }
    }
}

/// What ended up in a company's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyReport {
    pub folder: String,
    pub downloaded: usize,
    pub failed: usize,
    /// Set when the listing itself failed
    pub listing_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatementsArchive {
    pub bytes: Vec<u8>,
    pub companies: Vec<CompanyReport>,
}

impl StatementsArchive {
    pub fn pdf_count(&self) -> usize {
        self.companies.iter().map(|c| c.downloaded).sum()
    }
}

/// `{siren}_{name}` with path separators replaced and the name capped.
pub fn folder_name(company: &SelectedCompany) -> String {
    let name = company.name.trim();
    let name = if name.is_empty() { "entreprise" } else { name };
    let name: String = name
        .replace(['/', '\\'], "-")
        .chars()
        .take(MAX_FOLDER_NAME_CHARS)
        .collect();
    format!("{}_{}", company.siren, name)
}

/// Builds the archive for at most [`MAX_SELECTED`] companies, strictly one network
/// call at a time.
#[tracing::instrument(skip(source, companies, options))]
pub async fn build_statements_zip<S>(
    source: &S,
    companies: &[SelectedCompany],
    options: ArchiveOptions,
) -> Result<StatementsArchive>
where
    S: StatementSource + ?Sized,
{
    if companies.len() > MAX_SELECTED {
        warn!(
            "{} companies requested, only the first {} are archived",
            companies.len(),
            MAX_SELECTED
        );
    }

    let mut zip = MemoryZip::new();
    let mut reports = Vec::new();

    for company in companies.iter().take(MAX_SELECTED) {
        let report = add_company(&mut zip, source, company, options).await?;
        info!(
            "{}: {} PDF(s), {} failure(s)",
            report.folder, report.downloaded, report.failed
        );
        reports.push(report);
    }

    Ok(StatementsArchive {
        bytes: zip.finish()?,
        companies: reports,
    })
}

async fn add_company<S>(
    zip: &mut MemoryZip,
    source: &S,
    company: &SelectedCompany,
    options: ArchiveOptions,
) -> Result<CompanyReport>
where
    S: StatementSource + ?Sized,
{
    let folder = folder_name(company);
    let mut report = CompanyReport {
        folder: folder.clone(),
        downloaded: 0,
        failed: 0,
        listing_error: None,
    };

    let statements = match source.list_statements(&company.siren).await {
        Ok(statements) => statements,
        Err(e) => {
            warn!("Listing failed for {}: {:#}", company.siren, e);
            zip.add_text(
                &format!("{}/ERROR.txt", folder),
                &format!("Could not list statements ({}): {:#}\n", source.kind(), e),
            )?;
            report.listing_error = Some(format!("{:#}", e));
            return Ok(report);
        }
    };

    let statements = downloadable(statements);
    if statements.is_empty() {
        zip.add_text(
            &format!("{}/README.txt", folder),
            "No downloadable financial statement was found for this company.\n",
        )?;
        return Ok(report);
    }

    for statement in &statements {
        tokio::time::sleep(options.throttle).await;
        add_statement(zip, source, &folder, statement, &mut report).await?;
    }

    if report.downloaded == 0 {
        zip.add_text(
            &format!("{}/README.txt", folder),
            "Statements are listed but none could be downloaded (errors, access rights or confidentiality).\n",
        )?;
    }

    Ok(report)
}

async fn add_statement<S>(
    zip: &mut MemoryZip,
    source: &S,
    folder: &str,
    statement: &Statement,
    report: &mut CompanyReport,
) -> Result<()>
where
    S: StatementSource + ?Sized,
{
    match source.download(statement).await {
        Ok(bytes) => {
            zip.add_file(&format!("{}/{}", folder, statement.file_name()), &bytes)?;
            report.downloaded += 1;
        }
        Err(e) => {
            warn!("Download failed for {}: {:#}", statement.label(), e);
            zip.add_text(
                &format!("{}/ERROR_{}.txt", folder, statement.label()),
                &format!("Could not download statement: {:#}\n", e),
            )?;
            report.failed += 1;
        }
    }
    Ok(())
}
