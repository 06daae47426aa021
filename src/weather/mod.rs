//! Weather lookups: city → place, place → daily forecast

use crate::Result;
use crate::models::{Place, WeatherReport};
use async_trait::async_trait;

pub mod open_meteo;

pub use open_meteo::OpenMeteoClient;

/// Resolves a free-text city name to the best matching place
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Fails with `NotFound` when there is no match and `Transport` when
    /// the lookup itself fails.
    async fn resolve(&self, city: &str) -> Result<Place>;
}

/// Fetches the 7-day daily forecast for a coordinate
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherReport>;
}
