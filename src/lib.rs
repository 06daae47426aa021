//! `Weathercast` - city name in, cinematic weather report out
//!
//! This library resolves a city to coordinates, fetches its 7-day forecast,
//! has a language model summarize it and a video model render a reporter
//! delivering the summary.

pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod telemetry;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::WeathercastConfig;
pub use credentials::{ApiKey, CredentialPrompt, Credentials};
pub use error::{ErrorCode, WeathercastError};
pub use models::{DailyForecast, Place, Summary, VideoArtifact, WeatherReport};
pub use pipeline::{Orchestrator, PipelineState, Stages};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeathercastError>;
