use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Coordinate, PlaceDetails};

/// Errors that can occur when looking up place context
#[derive(Debug, Error)]
pub enum PlaceLookupError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Address keys tried in order when naming the city
const CITY_KEYS: [&str; 4] = ["city", "town", "village", "suburb"];

/// Address keys tried in order when naming the country
const COUNTRY_KEYS: [&str; 3] = ["country", "state", "county"];

/// Endpoints and identity for [`PlaceLookup`]
#[derive(Debug, Clone)]
pub struct PlaceLookupOptions {
    pub nominatim_endpoint: String,
    pub wikipedia_endpoint: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for PlaceLookupOptions {
    fn default() -> Self {
        Self {
            nominatim_endpoint: "https://nominatim.openstreetmap.org".to_string(),
            wikipedia_endpoint: "https://en.wikipedia.org".to_string(),
            user_agent: "landmarker".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Reverse geocoding (Nominatim) and Wikipedia search
///
/// Used to decorate markers with a city, a country and a reading link.
pub struct PlaceLookup {
    nominatim_url: String,
    wikipedia_url: String,
    client: Client,
}

impl PlaceLookup {
    pub fn new(options: PlaceLookupOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()?;

        Ok(Self {
            nominatim_url: options.nominatim_endpoint.trim_end_matches('/').to_string(),
            wikipedia_url: options.wikipedia_endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Look up the city and country for a coordinate
    pub async fn reverse(
        &self,
        coordinate: Coordinate,
    ) -> Result<(Option<String>, Option<String>), PlaceLookupError> {
        let url = format!("{}/reverse", self.nominatim_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlaceLookupError::ApiError(format!(
                "Reverse geocoding failed: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let address = json
            .get("address")
            .ok_or_else(|| PlaceLookupError::InvalidResponse("Missing address object".into()))?;

        Ok((first_of(address, &CITY_KEYS), first_of(address, &COUNTRY_KEYS)))
    }

    /// Find the Wikipedia article that best matches a landmark name
    pub async fn wikipedia_page(&self, landmark: &str) -> Result<Option<String>, PlaceLookupError> {
        let url = format!("{}/w/api.php", self.wikipedia_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", landmark),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlaceLookupError::ApiError(format!(
                "Wikipedia search failed: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let results = json
            .pointer("/query/search")
            .and_then(|s| s.as_array())
            .ok_or_else(|| PlaceLookupError::InvalidResponse("Missing query.search array".into()))?;

        Ok(results
            .first()
            .and_then(|hit| hit.get("title"))
            .and_then(|t| t.as_str())
            .map(|title| {
                format!(
                    "{}/wiki/{}",
                    self.wikipedia_url,
                    urlencoding::encode(&title.replace(' ', "_"))
                )
            }))
    }

    /// Gather place details for a landmark, tolerating failures
    ///
    /// A failed lookup leaves the corresponding fields empty.
    pub async fn details(&self, name: &str, coordinate: Coordinate) -> PlaceDetails {
        let (location, page) = tokio::join!(self.reverse(coordinate), self.wikipedia_page(name));

        let (city, country) = location.unwrap_or_else(|e| {
            tracing::warn!("Reverse geocoding failed for {}: {}", name, e);
            (None, None)
        });

        let wikipedia_url = page.unwrap_or_else(|e| {
            tracing::warn!("Wikipedia lookup failed for {}: {}", name, e);
            None
        });

        PlaceDetails {
            city,
            country,
            wikipedia_url,
        }
    }
}

fn first_of(address: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| address.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
