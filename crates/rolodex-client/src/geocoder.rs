use std::time::Duration;

use reqwest::Client;
use rolodex_core::error::AppError;
use rolodex_core::traits::{Coordinates, Geocoder};
use serde::Deserialize;
use url::Url;

pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Geocoder backed by the OpenStreetMap Nominatim search API.
///
/// The public instance allows one request per second and requires an
/// identifying User-Agent; pacing is left to the caller.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("rolodex/", env!("CARGO_PKG_VERSION"), " (contact cleaner)"))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: NOMINATIM_SEARCH_URL.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Point at a self-hosted Nominatim instance.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, location: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            &self.base_url,
            &[("q", location), ("format", "jsonv2"), ("limit", "1")],
        )
        .map_err(|e| AppError::ConfigError(format!("Invalid geocoder URL: {e}")))
    }
}

impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, AppError> {
        let url = self.search_url(location)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }
            if status_code >= 500 {
                return Err(AppError::NetworkError(format!(
                    "Geocoder unavailable: HTTP {status_code}"
                )));
            }
            return Err(AppError::HttpError(format!("HTTP {status_code} from geocoder")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read geocoder response: {e}")))?;
        parse_places(&body)
    }
}

/// First result of a Nominatim `jsonv2` search, if any.
fn parse_places(body: &str) -> Result<Option<Coordinates>, AppError> {
    let places: Vec<Place> = serde_json::from_str(body)
        .map_err(|e| AppError::HttpError(format!("Unexpected geocoder response: {e}")))?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let parse = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|e| AppError::HttpError(format!("Bad coordinate '{raw}': {e}")))
    };
    Ok(Some(Coordinates::new(parse(&place.lat)?, parse(&place.lon)?)))
}
