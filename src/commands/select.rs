use anyhow::{Result, bail};
use log::debug;

use crate::{company::Siren, runtime::Runtime, session::Session};

use super::config::Config;

/// Replace the selection with the given identifiers
#[tracing::instrument(skip(runtime, config))]
pub fn select<R: Runtime + ?Sized>(runtime: &R, config: &Config, sirens: &[String]) -> Result<()> {
    let sirens = sirens
        .iter()
        .map(|s| s.parse::<Siren>())
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::load_or_default(runtime, &config.session_path)?;
    if session.results.is_empty() {
        bail!("No search results yet; run `bilans search` first");
    }

    let count = session.select(&sirens)?.len();
    debug!("{} company(ies) selected", count);
    session.save(runtime, &config.session_path)?;

    println!("Selected {} company(ies):", count);
    for company in session.selected_companies() {
        println!("  {}  {}", company.siren, company.name);
    }
    Ok(())
}
