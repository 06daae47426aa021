//! Pipeline state machine values

use crate::error::ErrorCode;
use crate::models::{DailyForecast, Place, Summary, VideoArtifact};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifier of one submitted search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub(crate) u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a successful run produced
#[derive(Debug)]
pub struct Report {
    pub place: Place,
    pub forecast: DailyForecast,
    pub summary: Summary,
    pub video: VideoArtifact,
}

/// The orchestrator's single state value
///
/// Each variant carries only the data that is valid in it, so an error with
/// a leftover video or a success without one cannot be expressed.
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    /// A search was submitted without an API key
    AwaitingCredential { city: String },
    /// Resolving the place and fetching its forecast
    FetchingWeather { city: String },
    GeneratingSummary {
        place: Place,
        forecast: DailyForecast,
    },
    GeneratingVideo {
        place: Place,
        forecast: DailyForecast,
        summary: Summary,
    },
    Success(Arc<Report>),
    Error { message: String, code: ErrorCode },
}

/// Discriminant of [`PipelineState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingCredential,
    FetchingWeather,
    GeneratingSummary,
    GeneratingVideo,
    Success,
    Error,
}

impl PipelineState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::AwaitingCredential { .. } => Phase::AwaitingCredential,
            Self::FetchingWeather { .. } => Phase::FetchingWeather,
            Self::GeneratingSummary { .. } => Phase::GeneratingSummary,
            Self::GeneratingVideo { .. } => Phase::GeneratingVideo,
            Self::Success(_) => Phase::Success,
            Self::Error { .. } => Phase::Error,
        }
    }

    /// Loading text for the in-flight phases
    #[must_use]
    pub fn status_text(&self) -> Option<&'static str> {
        match self {
            Self::FetchingWeather { .. } => Some("Fetching Forecast..."),
            Self::GeneratingSummary { .. } => Some("Analyzing Data..."),
            Self::GeneratingVideo { .. } => Some("Producing Video Report..."),
            _ => None,
        }
    }

    #[must_use]
    pub fn place(&self) -> Option<&Place> {
        match self {
            Self::GeneratingSummary { place, .. } | Self::GeneratingVideo { place, .. } => {
                Some(place)
            }
            Self::Success(report) => Some(&report.place),
            _ => None,
        }
    }

    #[must_use]
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Self::GeneratingVideo { summary, .. } => Some(summary),
            Self::Success(report) => Some(&report.summary),
            _ => None,
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&Arc<Report>> {
        match self {
            Self::Success(report) => Some(report),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingCredential => "awaiting_credential",
            Self::FetchingWeather => "fetching_weather",
            Self::GeneratingSummary => "generating_summary",
            Self::GeneratingVideo => "generating_video",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
