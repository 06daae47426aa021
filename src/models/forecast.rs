//! Daily forecast model
//!
//! Field names follow the Open-Meteo daily variables so the forecast can be
//! handed to the summarizer as-is.

use crate::WeathercastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The daily variables requested from the forecast API, in request order
pub const DAILY_VARIABLES: [&str; 8] = [
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "precipitation_probability_max",
    "wind_speed_10m_max",
    "wind_gusts_10m_max",
    "snowfall_sum",
];

/// Per-day weather variables, index-aligned by day
///
/// Index `i` of every sequence describes the day `time[i]`. Values are
/// optional because Open-Meteo reports gaps as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub time: Vec<NaiveDate>,
    pub weather_code: Vec<Option<u8>>,
    /// Maximum temperature in °C
    pub temperature_2m_max: Vec<Option<f32>>,
    /// Minimum temperature in °C
    pub temperature_2m_min: Vec<Option<f32>>,
    /// Precipitation total in mm
    pub precipitation_sum: Vec<Option<f32>>,
    /// Precipitation probability in percent
    pub precipitation_probability_max: Vec<Option<f32>>,
    /// Maximum wind speed in km/h
    pub wind_speed_10m_max: Vec<Option<f32>>,
    /// Maximum wind gust in km/h
    pub wind_gusts_10m_max: Vec<Option<f32>>,
    /// Snowfall total in cm
    pub snowfall_sum: Vec<Option<f32>>,
}

/// One day of a [`DailyForecast`]
#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub weather_code: Option<u8>,
    pub temperature_max: Option<f32>,
    pub temperature_min: Option<f32>,
    pub precipitation_sum: Option<f32>,
    pub precipitation_probability: Option<f32>,
    pub wind_speed_max: Option<f32>,
    pub wind_gust_max: Option<f32>,
    pub snowfall_sum: Option<f32>,
}

/// Forecast response: coordinate echo, the daily data and its units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    pub daily: DailyForecast,
    /// Unit descriptions, passed through unused
    #[serde(default)]
    pub daily_units: serde_json::Value,
}

impl DailyForecast {
    /// Number of days covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check that every sequence is as long as `time`
    pub fn validate(&self) -> crate::Result<()> {
        let expected = self.time.len();
        let lengths = [
            ("weather_code", self.weather_code.len()),
            ("temperature_2m_max", self.temperature_2m_max.len()),
            ("temperature_2m_min", self.temperature_2m_min.len()),
            ("precipitation_sum", self.precipitation_sum.len()),
            (
                "precipitation_probability_max",
                self.precipitation_probability_max.len(),
            ),
            ("wind_speed_10m_max", self.wind_speed_10m_max.len()),
            ("wind_gusts_10m_max", self.wind_gusts_10m_max.len()),
            ("snowfall_sum", self.snowfall_sum.len()),
        ];

        match lengths.iter().find(|(_, len)| *len != expected) {
            Some((name, len)) => Err(WeathercastError::invalid_response(format!(
                "daily.{name} has {len} values but daily.time has {expected}"
            ))),
            None => Ok(()),
        }
    }

    /// Iterate over the days as rows
    pub fn days(&self) -> impl Iterator<Item = DayForecast> + '_ {
        let at = |values: &[Option<f32>], i: usize| values.get(i).copied().flatten();
        self.time.iter().enumerate().map(move |(i, date)| DayForecast {
            date: *date,
            weather_code: self.weather_code.get(i).copied().flatten(),
            temperature_max: at(&self.temperature_2m_max, i),
            temperature_min: at(&self.temperature_2m_min, i),
            precipitation_sum: at(&self.precipitation_sum, i),
            precipitation_probability: at(&self.precipitation_probability_max, i),
            wind_speed_max: at(&self.wind_speed_10m_max, i),
            wind_gust_max: at(&self.wind_gusts_10m_max, i),
            snowfall_sum: at(&self.snowfall_sum, i),
        })
    }
}

impl DayForecast {
    /// Human-readable description of the weather code
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.weather_code
            .map_or("Unknown", weather_code_to_description)
    }

    /// One-line summary, e.g. `2024-03-01 Slight rain, 3.0°C to 9.5°C, 4.2 mm`
    #[must_use]
    pub fn format_line(&self) -> String {
        let fmt = |value: Option<f32>, unit: &str| {
            value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}{unit}"))
        };
        format!(
            "{} {}, {} to {}, {}, gusts {}",
            self.date.format("%a %b %d"),
            self.description(),
            fmt(self.temperature_min, "°C"),
            fmt(self.temperature_max, "°C"),
            fmt(self.precipitation_sum, " mm"),
            fmt(self.wind_gust_max, " km/h"),
        )
    }
}

/// Convert a WMO weather code to a human-readable description
#[must_use]
pub fn weather_code_to_description(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
