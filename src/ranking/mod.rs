//! Nearest-company search: postcode lookup, candidate collection, distance ranking.

use anyhow::{Result, bail};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;

use crate::company::{Company, CompanyDirectory, SearchQuery, UNRESOLVED_DISTANCE_KM};
use crate::geo::{Coordinates, Geocoder};

/// Size of the ranked set.
pub const MAX_RANKED: usize = 10;

/// Parameters of one "find the nearest companies" action.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyRequest {
    pub point: Coordinates,
    pub naf: Option<String>,
    pub text: Option<String>,
    pub per_page: u32,
    /// Number of result pages pooled before ranking (1 or 2 in practice)
    pub pages: u32,
}

/// Result of a search: the postcode the point resolved to and the ranked set.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyResult {
    pub postcode: String,
    pub companies: Vec<Company>,
}

/// Resolves the point to a postcode, pools the requested pages of search results,
/// and ranks the valid candidates by distance.
#[tracing::instrument(skip(geocoder, directory))]
pub async fn find_nearest<G, D>(
    geocoder: &G,
    directory: &D,
    request: &NearbyRequest,
) -> Result<NearbyResult>
where
    G: Geocoder + ?Sized,
    D: CompanyDirectory + ?Sized,
{
    let Some(postcode) = geocoder.reverse_postcode(request.point).await? else {
        bail!("Could not determine a postal code at {}", request.point);
    };
    info!("Point {} is in postcode {}", request.point, postcode);

    let mut hits = Vec::new();
    for page in 1..=request.pages.max(1) {
        let query = SearchQuery {
            postcode: Some(postcode.clone()),
            naf: request.naf.clone(),
            text: request.text.clone(),
            page,
            per_page: request.per_page,
        };
        hits.extend(directory.search(&query).await?);
    }
    debug!("Pooled {} raw hit(s)", hits.len());

    let candidates = collect_candidates(&hits, &postcode);
    let companies = rank_candidates(geocoder, request.point, candidates).await;

    Ok(NearbyResult {
        postcode,
        companies,
    })
}

/// Keeps hits whose identifier reduces to 9 digits, first occurrence wins.
pub fn collect_candidates(hits: &[Value], postcode: &str) -> Vec<Company> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter_map(|hit| Company::from_search_hit(hit, postcode))
        .filter(|company| seen.insert(company.siren.clone()))
        .collect()
}

/// Geocodes every candidate, measures its distance from `origin`, and returns the
/// closest [`MAX_RANKED`] in ascending order. Candidates that cannot be located get
/// [`UNRESOLVED_DISTANCE_KM`] and therefore sort last.
pub async fn rank_candidates<G>(
    geocoder: &G,
    origin: Coordinates,
    candidates: Vec<Company>,
) -> Vec<Company>
where
    G: Geocoder + ?Sized,
{
    let mut ranked = Vec::with_capacity(candidates.len());

    for mut company in candidates {
        let coordinates = match geocoder.geocode(&company.query_address).await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                warn!(
                    "Geocoding failed for {} ({:?}): {:#}",
                    company.siren, company.query_address, e
                );
                None
            }
        };

        company.coordinates = coordinates;
        company.distance_km = coordinates
            .map(|c| origin.distance_km(&c))
            .unwrap_or(UNRESOLVED_DISTANCE_KM);
        ranked.push(company);
    }

    sort_and_truncate(ranked)
}

/// Stable ascending sort by distance, cut to [`MAX_RANKED`].
pub fn sort_and_truncate(mut companies: Vec<Company>) -> Vec<Company> {
    companies.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    companies.truncate(MAX_RANKED);
    companies
}
