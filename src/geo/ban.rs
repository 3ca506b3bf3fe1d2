//! Client for the national address database (BAN) geocoding API.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use moka::future::Cache;
use std::time::Duration;

use super::{Coordinates, Geocoder};
use crate::http::{HttpClient, RequestOptions};

pub const DEFAULT_ADDRESS_URL: &str = "https://api-adresse.data.gouv.fr";

const GEOCODING_TIMEOUT: Duration = Duration::from_secs(20);
const REVERSE_TTL: Duration = Duration::from_secs(24 * 3600);
const GEOCODE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const CACHE_CAPACITY: u64 = 10_000;

/// BAN API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Default)]
    pub struct FeatureCollection {
        #[serde(default)]
        pub features: Vec<Feature>,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct Feature {
        #[serde(default)]
        pub properties: Properties,
        #[serde(default)]
        pub geometry: Option<Geometry>,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct Properties {
        #[serde(default)]
        pub postcode: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Geometry {
        /// `[longitude, latitude]`
        pub coordinates: Vec<f64>,
    }
}

/// Reverse and forward geocoding with time-bounded caches.
pub struct BanClient {
    http_client: HttpClient,
    base_url: String,
    postcodes: Cache<String, Option<String>>,
    addresses: Cache<String, Option<Coordinates>>,
}

impl BanClient {
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            postcodes: Cache::builder()
                .time_to_live(REVERSE_TTL)
                .max_capacity(CACHE_CAPACITY)
                .build(),
            addresses: Cache::builder()
                .time_to_live(GEOCODE_TTL)
                .max_capacity(CACHE_CAPACITY)
                .build(),
        }
    }
}

#[async_trait]
impl Geocoder for BanClient {
    #[tracing::instrument(skip(self))]
    async fn reverse_postcode(&self, point: Coordinates) -> Result<Option<String>> {
        let key = format!("{:.6},{:.6}", point.lat, point.lon);
        if let Some(postcode) = self.postcodes.get(&key).await {
            debug!("Reverse geocoding cache hit for {}", key);
            return Ok(postcode);
        }

        let url = format!("{}/reverse/", self.base_url);
        let options = RequestOptions::new()
            .query("lat", point.lat)
            .query("lon", point.lon)
            .timeout(GEOCODING_TIMEOUT);
        let data: api::FeatureCollection = self.http_client.get_json(&url, &options).await?;

        let postcode = data
            .features
            .into_iter()
            .next()
            .and_then(|f| f.properties.postcode)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        self.postcodes.insert(key, postcode.clone()).await;
        Ok(postcode)
    }

    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let key = address.to_string();
        if let Some(coordinates) = self.addresses.get(&key).await {
            debug!("Geocoding cache hit for {:?}", key);
            return Ok(coordinates);
        }

        let url = format!("{}/search/", self.base_url);
        let options = RequestOptions::new()
            .query("q", address)
            .query("limit", 1)
            .timeout(GEOCODING_TIMEOUT);
        let data: api::FeatureCollection = self.http_client.get_json(&url, &options).await?;

        let coordinates = data
            .features
            .into_iter()
            .next()
            .and_then(|f| f.geometry)
            .and_then(|g| match g.coordinates.as_slice() {
                [lon, lat, ..] => Some(Coordinates::new(*lat, *lon)),
                _ => None,
            });

        self.addresses.insert(key, coordinates).await;
        Ok(coordinates)
    }
}
