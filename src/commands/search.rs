use anyhow::{Result, bail};
use log::{info, warn};
use std::path::Path;

use crate::{
    company::{CompanyDirectory, MAX_PER_PAGE, normalize_naf},
    geo::{Coordinates, Geocoder},
    ranking::{NearbyRequest, find_nearest},
    runtime::Runtime,
    session::Session,
};

use super::config::Config;
use super::services::{build_directory, build_geocoder, build_http_client};
use super::show::print_results;

/// What `bilans search` was asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub point: Coordinates,
    pub naf: Option<String>,
    pub text: Option<String>,
    pub per_page: u32,
    /// Pool the first two result pages instead of one
    pub two_pages: bool,
}

impl SearchOptions {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            point: Coordinates::new(lat, lon),
            naf: None,
            text: None,
            per_page: MAX_PER_PAGE,
            two_pages: true,
        }
    }

    fn validate(&self) -> Result<()> {
        let Coordinates { lat, lon } = self.point;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            bail!("Latitude must be between -90 and 90, got {}", lat);
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            bail!("Longitude must be between -180 and 180, got {}", lon);
        }
        Ok(())
    }

    fn request(&self) -> NearbyRequest {
        NearbyRequest {
            point: self.point,
            naf: self.normalized_naf(),
            text: self
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            per_page: self.per_page,
            pages: if self.two_pages { 2 } else { 1 },
        }
    }

    fn normalized_naf(&self) -> Option<String> {
        self.naf
            .as_deref()
            .map(normalize_naf)
            .filter(|naf| !naf.is_empty())
    }
}

/// Find the companies nearest to a point and store them in the session
#[tracing::instrument(skip(runtime, config))]
pub async fn search<R: Runtime + ?Sized>(
    runtime: &R,
    config: &Config,
    options: SearchOptions,
) -> Result<()> {
    let http_client = build_http_client()?;
    let geocoder = build_geocoder(config, http_client.clone());
    let directory = build_directory(config, http_client);

    run_search(runtime, &config.session_path, &geocoder, &directory, &options).await?;
    Ok(())
}

pub(crate) async fn run_search<R, G, D>(
    runtime: &R,
    session_path: &Path,
    geocoder: &G,
    directory: &D,
    options: &SearchOptions,
) -> Result<Session>
where
    R: Runtime + ?Sized,
    G: Geocoder + ?Sized,
    D: CompanyDirectory + ?Sized,
{
    options.validate()?;
    let request = options.request();
    let found = find_nearest(geocoder, directory, &request).await?;
    info!(
        "{} compan(ies) ranked around {}",
        found.companies.len(),
        found.postcode
    );

    let mut session = match Session::load_or_default(runtime, session_path) {
        Ok(session) => session,
        Err(e) => {
            warn!("Starting a fresh session: {:#}", e);
            Session::default()
        }
    };
    session.replace_results(options.point, request.naf, found);
    session.save(runtime, session_path)?;

    println!(
        "Postcode {} around {}",
        session.postcode.as_deref().unwrap_or("?"),
        options.point
    );
    print_results(&session);
    Ok(session)
}
