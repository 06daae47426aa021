//! Data models for Weathercast
//!
//! This module contains the core domain models organized by concern:
//! - Place: resolved geographic identity of a searched city
//! - Forecast: index-aligned daily forecast and the report wrapping it
//! - Summary: narrative text produced from a forecast
//! - Video: downloaded video content and its local handle

pub mod forecast;
pub mod place;
pub mod summary;
pub mod video;

// Re-export all public types for convenient access
pub use forecast::{DailyForecast, DayForecast, WeatherReport};
pub use place::Place;
pub use summary::Summary;
pub use video::{ArtifactId, VideoArtifact};
