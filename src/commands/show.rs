use anyhow::Result;
use log::debug;

use crate::{
    company::{Company, UNRESOLVED_DISTANCE_KM},
    runtime::Runtime,
    session::Session,
};

use super::config::Config;

/// Print the last search and the current selection
#[tracing::instrument(skip(runtime, config))]
pub fn show<R: Runtime + ?Sized>(runtime: &R, config: &Config) -> Result<()> {
    debug!("Loading session from {}", config.session_path.display());
    let session = Session::load_or_default(runtime, &config.session_path)?;

    let Some(point) = session.point else {
        println!("No search yet. Run `bilans search --lat <LAT> --lon <LON>` first.");
        return Ok(());
    };

    println!("Point: {}", point);
    if let Some(postcode) = &session.postcode {
        println!("Postcode: {}", postcode);
    }
    if let Some(naf) = &session.naf {
        println!("Activity (NAF): {}", naf);
    }
    println!();
    print_results(&session);

    println!();
    let selected = session.selected_companies();
    if selected.is_empty() {
        println!("Selection: (none)");
    } else {
        println!("Selection:");
        for company in selected {
            println!("  {}  {}", company.siren, company.name);
        }
    }
    Ok(())
}

pub(crate) fn format_distance(company: &Company) -> String {
    if company.distance_km >= UNRESOLVED_DISTANCE_KM {
        "n/a".to_string()
    } else {
        format!("{:.2} km", company.distance_km)
    }
}

/// Ranked table; selected rows are starred.
pub(crate) fn print_results(session: &Session) {
    if session.results.is_empty() {
        println!("No company found.");
        return;
    }

    println!(
        "{:>3}  {:<9}  {:>10}  {:<40}  ADDRESS",
        "#", "SIREN", "DISTANCE", "NAME"
    );
    for (i, company) in session.results.iter().enumerate() {
        let mark = if session.selected.contains(&company.siren) {
            "*"
        } else {
            " "
        };
        let address = if company.address.is_empty() {
            company.locality.as_str()
        } else {
            company.address.as_str()
        };
        println!(
            "{}{:>2}  {:<9}  {:>10}  {:<40}  {}",
            mark,
            i + 1,
            company.siren,
            format_distance(company),
            company.name,
            address
        );
    }
}
