//! Open-Meteo geocoding and forecast client
//!
//! Both APIs are keyless. Failures are surfaced immediately; there is no
//! retry or backoff.

use super::{ForecastProvider, Geocoder};
use crate::config::WeatherConfig;
use crate::models::forecast::DAILY_VARIABLES;
use crate::models::{Place, WeatherReport};
use crate::{Result, WeathercastError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// HTTP client for the Open-Meteo geocoding and forecast APIs
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    /// Create a new client from configuration
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("Weathercast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeathercastError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    fn geocoding_request_url(&self, city: &str) -> String {
        format!(
            "{}?name={}&count=1&language=en&format=json",
            self.geocoding_url,
            urlencoding::encode(city)
        )
    }

    fn forecast_request_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={}&longitude={}&daily={}&timezone=auto",
            self.forecast_url,
            latitude,
            longitude,
            DAILY_VARIABLES.join(",")
        )
    }

    /// GET `url`, mapping network failures and non-2xx statuses to `Transport`
    async fn get(&self, url: &str, failure: &str) -> Result<Response> {
        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Network error after {:.3}s: {}", start.elapsed().as_secs_f64(), e);
            WeathercastError::transport(format!("{failure}: {e}"))
        })?;

        let status = response.status();
        debug!(
            "HTTP response received: {} in {:.3}s",
            status,
            start.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            warn!("{} (HTTP {})", failure, status.as_u16());
            return Err(WeathercastError::transport(format!(
                "{failure} ({} {})",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Geocoder for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn resolve(&self, city: &str) -> Result<Place> {
        info!("Geocoding location: '{}'", city);
        let start = Instant::now();

        let response = self
            .get(&self.geocoding_request_url(city), "Failed to fetch location data")
            .await?;

        let geocoding: GeocodingResponse = response.json().await.map_err(|e| {
            WeathercastError::invalid_response(format!(
                "Invalid geocoding data for '{city}': {e}"
            ))
        })?;

        let Some(first) = geocoding.results.unwrap_or_default().into_iter().next() else {
            warn!("No results found for location '{}'", city);
            return Err(WeathercastError::not_found(city));
        };

        let place = Place::from(first);
        info!(
            "Resolved '{}' to {} ({}) in {:.3}s",
            city,
            place.display_name(),
            place.format_coordinates(),
            start.elapsed().as_secs_f64()
        );
        Ok(place)
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherReport> {
        info!(
            "Getting 7-day forecast for coordinates: {:.4}, {:.4}",
            latitude, longitude
        );
        let start = Instant::now();

        let response = self
            .get(
                &self.forecast_request_url(latitude, longitude),
                "Failed to fetch weather forecast",
            )
            .await?;

        let report: WeatherReport = response.json().await.map_err(|e| {
            WeathercastError::invalid_response(format!("Invalid forecast data: {e}"))
        })?;
        report.daily.validate()?;

        let total = start.elapsed();
        info!(
            "Retrieved {}-day forecast in {:.3}s",
            report.daily.len(),
            total.as_secs_f64()
        );
        if total.as_secs() > 5 {
            warn!("Slow forecast API response: {:.3}s", total.as_secs_f64());
        }

        Ok(report)
    }
}

/// Geocoding response from Open-Meteo
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    #[serde(default)]
    id: u64,
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
}

impl From<GeocodingResult> for Place {
    fn from(result: GeocodingResult) -> Self {
        Place {
            id: result.id,
            name: result.name,
            country: result.country.unwrap_or_else(|| "Unknown".into()),
            latitude: result.latitude,
            longitude: result.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::new(&WeatherConfig {
            geocoding_url: format!("{}/v1/search", server.uri()),
            forecast_url: format!("{}/v1/forecast", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn seven_day_daily() -> serde_json::Value {
        json!({
            "time": ["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04",
                     "2024-03-05", "2024-03-06", "2024-03-07"],
            "weather_code": [61, 3, 2, 1, 0, 80, 95],
            "temperature_2m_max": [9.5, 11.0, 12.0, 13.0, 14.0, 10.0, 8.0],
            "temperature_2m_min": [3.0, 4.0, 5.0, 6.0, 7.0, 4.0, 2.0],
            "precipitation_sum": [4.2, 0.0, 0.0, 0.0, 0.0, 6.1, 12.0],
            "precipitation_probability_max": [80, 10, 5, 0, 0, 70, 90],
            "wind_speed_10m_max": [20.0, 15.0, 10.0, 8.0, 9.0, 25.0, 30.0],
            "wind_gusts_10m_max": [45.0, 30.0, 20.0, 18.0, 19.0, 50.0, 65.0],
            "snowfall_sum": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        })
    }

    #[test]
    fn test_geocoding_url_encodes_name() {
        let client = OpenMeteoClient::new(&WeatherConfig::default()).unwrap();
        let url = client.geocoding_request_url("São Paulo");
        assert_eq!(
            url,
            "https://geocoding-api.open-meteo.com/v1/search?name=S%C3%A3o%20Paulo&count=1&language=en&format=json"
        );
    }

    #[test]
    fn test_forecast_url_lists_daily_variables() {
        let client = OpenMeteoClient::new(&WeatherConfig::default()).unwrap();
        let url = client.forecast_request_url(52.52, 13.405);
        assert!(url.contains("latitude=52.52&longitude=13.405"));
        assert!(url.contains(
            "daily=weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,precipitation_probability_max,wind_speed_10m_max,wind_gusts_10m_max,snowfall_sum"
        ));
        assert!(url.ends_with("&timezone=auto"));
    }

    #[tokio::test]
    async fn test_resolve_returns_top_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Berlin"))
            .and(query_param("count", "1"))
            .and(query_param("language", "en"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": 2950159,
                    "name": "Berlin",
                    "latitude": 52.52,
                    "longitude": 13.405,
                    "country": "Germany",
                    "timezone": "Europe/Berlin"
                }],
                "generationtime_ms": 0.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let place = client_for(&server).resolve("Berlin").await.unwrap();
        assert_eq!(place.id, 2950159);
        assert_eq!(place.name, "Berlin");
        assert_eq!(place.country, "Germany");
        assert_eq!(place.latitude, 52.52);
        assert_eq!(place.longitude, 13.405);
    }

    #[tokio::test]
    async fn test_resolve_without_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "generationtime_ms": 0.3 })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).resolve("Xyzzyplex").await.unwrap_err();
        assert!(matches!(err, WeathercastError::NotFound { .. }));
        assert!(err.to_string().contains("Xyzzyplex"));
    }

    #[tokio::test]
    async fn test_resolve_with_empty_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).resolve("Nowhere").await.unwrap_err();
        assert!(matches!(err, WeathercastError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).resolve("Berlin").await.unwrap_err();
        assert!(matches!(err, WeathercastError::Transport { .. }));
        assert!(err.to_string().contains("Failed to fetch location data"));
    }

    #[tokio::test]
    async fn test_missing_country_defaults_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "id": 1, "name": "Atlantis", "latitude": 0.0, "longitude": 0.0 }]
            })))
            .mount(&server)
            .await;

        let place = client_for(&server).resolve("Atlantis").await.unwrap();
        assert_eq!(place.country, "Unknown");
    }

    #[tokio::test]
    async fn test_forecast_returns_aligned_daily_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.52"))
            .and(query_param("longitude", "13.405"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "latitude": 52.52,
                "longitude": 13.419998,
                "timezone": "Europe/Berlin",
                "daily_units": { "temperature_2m_max": "°C" },
                "daily": seven_day_daily()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = client_for(&server).forecast(52.52, 13.405).await.unwrap();
        assert_eq!(report.daily.len(), 7);
        assert!(report.daily.validate().is_ok());
        assert_eq!(report.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(report.daily_units["temperature_2m_max"], "°C");
    }

    #[tokio::test]
    async fn test_forecast_rejects_misaligned_arrays() {
        let server = MockServer::start().await;
        let mut daily = seven_day_daily();
        daily["snowfall_sum"] = json!([0.0, 0.0]);
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "latitude": 52.52,
                "longitude": 13.405,
                "daily": daily
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).forecast(52.52, 13.405).await.unwrap_err();
        assert!(matches!(err, WeathercastError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_forecast_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).forecast(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeathercastError::Transport { .. }));
        assert!(err.to_string().contains("Failed to fetch weather forecast"));
    }
}
