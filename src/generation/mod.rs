//! Generative stages: forecast → narrative summary → reporter video
//!
//! Both clients talk to the Gemini Developer API and read the API key from
//! the shared [`Credentials`](crate::credentials::Credentials) on every call.

use crate::Result;
use crate::models::{DailyForecast, Place, Summary, VideoArtifact};
use async_trait::async_trait;

pub mod gemini;
pub mod prompts;
pub mod veo;

pub use gemini::GeminiSummarizer;
pub use veo::VeoSynthesizer;

/// Turns a structured forecast into prose
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, place: &Place, forecast: &DailyForecast) -> Result<Summary>;
}

/// Renders a reporter video for a place and its summary
#[async_trait]
pub trait VideoSynthesizer: Send + Sync {
    /// The returned artifact owns a local file that is removed when it is
    /// dropped.
    async fn synthesize(&self, place_name: &str, summary: &Summary) -> Result<VideoArtifact>;
}
