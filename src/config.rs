//! Configuration management for `Weathercast`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeathercastError;
use crate::generation::veo::{Resolution, VeoModel};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for `Weathercast`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeathercastConfig {
    /// Open-Meteo configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Text and video generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Open-Meteo endpoints and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
}

/// Gemini / Veo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// API key; falls back to `GEMINI_API_KEY` then `API_KEY`
    pub api_key: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default)]
    pub video_model: VeoModel,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Request timeout for text generation and video download, in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Wall-clock limit for one video job, in seconds
    #[serde(default = "default_video_timeout")]
    pub video_timeout_seconds: u64,
    /// Directory for downloaded videos; the OS temp dir when unset
    pub video_dir: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint; tracing export is off when unset
    pub otlp_endpoint: Option<String>,
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Front-end assets served at `/`
    pub static_dir: Option<PathBuf>,
}

// Default value functions
fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_weather_timeout() -> u32 {
    30
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_generation_timeout() -> u32 {
    120
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_video_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            text_model: default_text_model(),
            video_model: VeoModel::default(),
            resolution: Resolution::default(),
            aspect_ratio: default_aspect_ratio(),
            timeout_seconds: default_generation_timeout(),
            poll_interval_seconds: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            video_timeout_seconds: default_video_timeout(),
            video_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl GenerationConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_seconds)
    }

    /// The configured key, or the first one found in the environment
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl WeathercastConfig {
    /// Load configuration from `config_path` (or the default location) and
    /// environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // WEATHERCAST_GENERATION__API_KEY -> generation.api_key
        builder = builder.add_source(
            Environment::with_prefix("WEATHERCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: WeathercastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weathercast").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.geocoding_url.is_empty() {
            self.weather.geocoding_url = default_geocoding_url();
        }
        if self.weather.forecast_url.is_empty() {
            self.weather.forecast_url = default_forecast_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.generation.api_base_url.is_empty() {
            self.generation.api_base_url = default_api_base_url();
        }
        if self.generation.text_model.is_empty() {
            self.generation.text_model = default_text_model();
        }
        if self.generation.aspect_ratio.is_empty() {
            self.generation.aspect_ratio = default_aspect_ratio();
        }
        if self.generation.timeout_seconds == 0 {
            self.generation.timeout_seconds = default_generation_timeout();
        }
        if self.generation.poll_interval_seconds == 0 {
            self.generation.poll_interval_seconds = default_poll_interval();
        }
        if self.generation.max_poll_attempts == 0 {
            self.generation.max_poll_attempts = default_max_poll_attempts();
        }
        if self.generation.video_timeout_seconds == 0 {
            self.generation.video_timeout_seconds = default_video_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// A configured key may be absent (selected later), but never blank
    pub fn validate_api_key(&self) -> Result<()> {
        if let Some(api_key) = &self.generation.api_key {
            if api_key.trim().is_empty() {
                return Err(WeathercastError::config(
                    "Generation API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }
        }
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 {
            return Err(
                WeathercastError::config("Weather API timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.generation.poll_interval_seconds > 300 {
            return Err(
                WeathercastError::config("Video poll interval cannot exceed 300 seconds").into(),
            );
        }

        if self.generation.video_timeout_seconds > 3600 {
            return Err(WeathercastError::config(
                "Video generation timeout cannot exceed 3600 seconds",
            )
            .into());
        }

        if self.generation.poll_interval_seconds > self.generation.video_timeout_seconds {
            return Err(WeathercastError::config(
                "Video poll interval cannot exceed the video generation timeout",
            )
            .into());
        }

        if self.generation.max_poll_attempts > 1000 {
            return Err(
                WeathercastError::config("Maximum poll attempts cannot exceed 1000").into(),
            );
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeathercastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeathercastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_aspect_ratios = ["16:9", "9:16"];
        if !valid_aspect_ratios.contains(&self.generation.aspect_ratio.as_str()) {
            return Err(WeathercastError::config(format!(
                "Invalid aspect ratio '{}'. Must be one of: {}",
                self.generation.aspect_ratio,
                valid_aspect_ratios.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Geocoding", &self.weather.geocoding_url),
            ("Forecast", &self.weather.forecast_url),
            ("Generation", &self.generation.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeathercastError::config(format!(
                    "{name} API URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
