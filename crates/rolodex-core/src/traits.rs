use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Latitude/longitude pair; both `None` when a place could not be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

/// Resolves free-text locations to coordinates.
pub trait Geocoder: Send + Sync + Clone {
    /// Returns `Ok(None)` when the service knows no such place.
    fn geocode(
        &self,
        location: &str,
    ) -> impl Future<Output = Result<Option<Coordinates>, AppError>> + Send;
}

/// A Geocoder that never resolves anything, for offline cleaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    async fn geocode(&self, _location: &str) -> Result<Option<Coordinates>, AppError> {
        Ok(None)
    }
}
