//! Gemini text generation client for forecast summaries

use super::Summarizer;
use super::prompts::{summary_system_instruction, summary_user_prompt};
use crate::config::GenerationConfig;
use crate::credentials::Credentials;
use crate::models::{DailyForecast, Place, Summary};
use crate::{Result, WeathercastError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Summarizes forecasts with a single `generateContent` call
#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    client: Client,
    credentials: Credentials,
    api_base_url: String,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(config: &GenerationConfig, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("Weathercast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeathercastError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.text_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url, self.model
        )
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    #[instrument(skip(self, forecast), fields(place = %place.display_name(), model = %self.model))]
    async fn summarize(&self, place: &Place, forecast: &DailyForecast) -> Result<Summary> {
        let api_key = self.credentials.current()?;
        let start = Instant::now();

        let request = GenerateContentRequest {
            system_instruction: Content::system(summary_system_instruction(place)),
            contents: vec![Content::user(summary_user_prompt(place, forecast)?)],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                WeathercastError::transport(format!("Gemini API request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeathercastError::provider(
                status.as_u16(),
                error_message(&body).unwrap_or(body),
            ));
        }

        let generated: GenerateContentResponse = response.json().await?;
        let text = generated.text();
        debug!(chars = text.len(), "received summary text");

        let summary = Summary::new(text);
        info!(
            "Generated summary ({} chars) in {:.3}s",
            summary.as_str().len(),
            start.elapsed().as_secs_f64()
        );
        Ok(summary)
    }
}

/// Pulls `error.message` out of a Google API error body
pub(crate) fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

impl Content {
    fn system(text: String) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }

    fn user(text: String) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}
