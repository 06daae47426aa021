//! Veo video generation client
//!
//! A video is produced in three steps: submit a long-running prediction,
//! poll the returned operation until it reports `done`, then download the
//! first generated sample. Submitting and polling share one wall-clock
//! budget that also bounds requests still in flight, and polling is capped by
//! an attempt count.

use super::VideoSynthesizer;
use super::gemini::error_message;
use super::prompts::reporter_video_prompt;
use crate::config::GenerationConfig;
use crate::credentials::{ApiKey, Credentials};
use crate::models::{Summary, VideoArtifact};
use crate::{Result, WeathercastError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Veo model variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VeoModel {
    #[default]
    #[serde(rename = "veo-3.1-generate-preview")]
    Veo,
    #[serde(rename = "veo-3.1-fast-generate-preview")]
    VeoFast,
}

impl VeoModel {
    /// Model identifier used in the request path
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Veo => "veo-3.1-generate-preview",
            Self::VeoFast => "veo-3.1-fast-generate-preview",
        }
    }
}

/// Output resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P720 => "720p",
            Self::P1080 => "1080p",
        }
    }
}

/// Renders reporter videos through the Veo `predictLongRunning` API
#[derive(Debug, Clone)]
pub struct VeoSynthesizer {
    client: Client,
    credentials: Credentials,
    api_base_url: String,
    model: VeoModel,
    resolution: Resolution,
    aspect_ratio: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    timeout: Duration,
    request_timeout: Duration,
    video_dir: Option<PathBuf>,
}

impl VeoSynthesizer {
    pub fn new(config: &GenerationConfig, credentials: Credentials) -> Result<Self> {
        // Timeouts are set per request; a finished clip may download for longer
        // than an API call is allowed to take.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("Weathercast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeathercastError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.video_model,
            resolution: config.resolution,
            aspect_ratio: config.aspect_ratio.clone(),
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            timeout: config.video_timeout(),
            request_timeout: Duration::from_secs(config.timeout_seconds.into()),
            video_dir: config.video_dir.clone(),
        })
    }

    /// Sets the delay between operation polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum number of operation polls.
    #[must_use]
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    /// Sets the maximum time to wait for the operation to finish.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn submit(&self, api_key: &ApiKey, prompt: String) -> Result<Operation> {
        let url = format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.api_base_url,
            self.model.as_str()
        );
        let body = PredictRequest {
            instances: vec![Instance { prompt }],
            parameters: Parameters {
                aspect_ratio: &self.aspect_ratio,
                resolution: self.resolution.as_str(),
                number_of_videos: 1,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| WeathercastError::transport(format!("Veo API request failed: {e}")))?;

        let operation: Operation = provider_json(response).await?;
        if operation.name.is_empty() {
            return Err(WeathercastError::invalid_response(
                "Video operation has no name",
            ));
        }
        Ok(operation)
    }

    async fn poll(&self, api_key: &ApiKey, name: &str) -> Result<Operation> {
        let url = format!("{}/v1beta/{}", self.api_base_url, name);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key.expose())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| WeathercastError::transport(format!("Veo API request failed: {e}")))?;

        provider_json(response).await
    }

    /// Poll until the operation is done or the budget that began at `start`
    /// is spent
    ///
    /// A submitted operation is always polled at least once.
    async fn wait_for(
        &self,
        api_key: &ApiKey,
        mut operation: Operation,
        start: Instant,
    ) -> Result<Operation> {
        let deadline = start + self.timeout;
        let interval = self.poll_interval.min(self.timeout / 2);
        let name = operation.name.clone();
        let mut attempts = 0u32;

        while !operation.done {
            if let Some(error) = operation.error.take() {
                return Err(error.into_error());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if attempts > 0 && (attempts >= self.max_poll_attempts || remaining < interval) {
                warn!(
                    operation = %name,
                    attempts,
                    "giving up on video generation"
                );
                return Err(WeathercastError::Timeout {
                    elapsed: start.elapsed(),
                    attempts,
                });
            }

            tokio::time::sleep(interval.min(remaining)).await;
            attempts += 1;
            operation =
                before_deadline(start, deadline, attempts, self.poll(api_key, &name)).await?;
            debug!(
                operation = %name,
                attempts,
                done = operation.done,
                elapsed_secs = start.elapsed().as_secs(),
                "polled video generation"
            );
        }

        Ok(operation)
    }

    async fn download(&self, api_key: &ApiKey, uri: &str) -> Result<bytes::Bytes> {
        let decoded = urlencoding::decode(uri)
            .map_err(|e| WeathercastError::invalid_response(format!("Invalid video URI: {e}")))?;
        let separator = if decoded.contains('?') { '&' } else { '?' };
        let url = format!(
            "{decoded}{separator}key={}",
            urlencoding::encode(api_key.expose())
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| WeathercastError::transport(format!("Failed to download video: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeathercastError::transport(format!(
                "Failed to download video: HTTP {status}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| WeathercastError::transport(format!("Failed to download video: {e}")))
    }
}

#[async_trait]
impl VideoSynthesizer for VeoSynthesizer {
    #[instrument(skip(self, summary), fields(model = self.model.as_str()))]
    async fn synthesize(&self, place_name: &str, summary: &Summary) -> Result<VideoArtifact> {
        let api_key = self.credentials.current()?;
        let start = Instant::now();

        let prompt = reporter_video_prompt(place_name, summary);
        debug!(%prompt, "submitting video generation");

        let deadline = start + self.timeout;
        let operation = before_deadline(start, deadline, 0, self.submit(&api_key, prompt)).await?;
        debug!(operation = %operation.name, "submitted video generation request");

        let operation = self.wait_for(&api_key, operation, start).await?;
        let uri = operation.into_video_uri()?;
        debug!(%uri, "video generation complete");

        let data = self.download(&api_key, &uri).await?;
        let artifact =
            VideoArtifact::store(data, VIDEO_MIME_TYPE, uri, self.video_dir.clone()).await?;

        info!(
            "Generated video {} ({} bytes) in {:.1}s",
            artifact.id(),
            artifact.size(),
            start.elapsed().as_secs_f64()
        );
        Ok(artifact)
    }
}

/// Run `request`, giving up with a timeout once `deadline` passes
async fn before_deadline<T>(
    start: Instant,
    deadline: Instant,
    attempts: u32,
    request: impl Future<Output = Result<T>>,
) -> Result<T> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, request).await {
        Ok(result) => result,
        Err(_) => {
            warn!(attempts, "video generation request outlived its deadline");
            Err(WeathercastError::Timeout {
                elapsed: start.elapsed(),
                attempts,
            })
        }
    }
}

/// Decode a 2xx body, or turn the response into a provider error
async fn provider_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WeathercastError::provider(
            status.as_u16(),
            error_message(&body).unwrap_or(body),
        ));
    }
    Ok(response.json().await?)
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance>,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    aspect_ratio: &'a str,
    resolution: &'static str,
    number_of_videos: u8,
}

#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

impl OperationError {
    fn into_error(self) -> WeathercastError {
        WeathercastError::provider(
            self.code.unwrap_or(500),
            self.message
                .unwrap_or_else(|| "Video generation failed".to_string()),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

impl Operation {
    /// URI of the first generated video of a finished operation
    fn into_video_uri(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(error.into_error());
        }

        let first = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .ok_or(WeathercastError::EmptyResult)?;

        first
            .video
            .and_then(|v| v.uri)
            .filter(|uri| !uri.is_empty())
            .ok_or(WeathercastError::MalformedResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OPERATION: &str = "models/veo-3.1-generate-preview/operations/op-123";

    fn synthesizer_for(server: &MockServer) -> VeoSynthesizer {
        let config = GenerationConfig {
            api_base_url: server.uri(),
            ..GenerationConfig::default()
        };
        let credentials = Credentials::with_key(ApiKey::new("test-key").unwrap());
        VeoSynthesizer::new(&config, credentials)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
            .with_max_poll_attempts(5)
            .with_timeout(Duration::from_secs(5))
    }

    fn summary() -> Summary {
        Summary::new("Day 1: Sat Mar 02\n- Crisp and sunny.")
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(
                "/v1beta/models/veo-3.1-generate-preview:predictLongRunning",
            ))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": OPERATION })),
            )
            .mount(server)
            .await;
    }

    fn done_with(response: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "name": OPERATION,
            "done": true,
            "response": response
        }))
    }

    #[tokio::test]
    async fn test_synthesize_submits_polls_and_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1beta/models/veo-3.1-generate-preview:predictLongRunning",
            ))
            .and(body_json(json!({
                "instances": [{
                    "prompt": "Professional TV reporter in modern studio delivers 7-day forecast for Oslo, Norway: Day 1: Sat Mar 02\n- Crisp and sunny...., cinematic, clear audio narration, 8-second clip"
                }],
                "parameters": { "aspectRatio": "16:9", "resolution": "720p", "numberOfVideos": 1 }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": OPERATION })),
            )
            .expect(1)
            .mount(&server)
            .await;

        // First poll still running, second one finished
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "name": OPERATION, "done": false })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let video_uri = format!("{}/v1beta/files/abc%3Adownload?alt=media", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(done_with(json!({
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": video_uri } }]
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc:download"))
            .and(query_param("alt", "media"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4 bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let artifact = synthesizer_for(&server)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap();

        assert_eq!(artifact.data().as_ref(), b"mp4 bytes");
        assert_eq!(artifact.mime_type(), "video/mp4");
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"mp4 bytes");
    }

    #[tokio::test]
    async fn test_poll_loop_times_out() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "name": OPERATION, "done": false })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .with_max_poll_attempts(3)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();

        match err {
            WeathercastError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_poll_is_cut_off_at_timeout() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "name": OPERATION, "done": false }))
                    .set_delay(Duration::from_secs(4)),
            )
            .mount(&server)
            .await;

        let started = Instant::now();
        let err = synthesizer_for(&server)
            .with_timeout(Duration::from_millis(300))
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            WeathercastError::Timeout { elapsed, attempts } => {
                assert_eq!(attempts, 1);
                assert!(elapsed < Duration::from_secs(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interval_longer_than_timeout_still_polls() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        let video_uri = format!("{}/files/clip.mp4", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(done_with(json!({
                "generateVideoResponse": { "generatedSamples": [{ "video": { "uri": video_uri } }] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip".to_vec()))
            .mount(&server)
            .await;

        let artifact = synthesizer_for(&server)
            .with_poll_interval(Duration::from_millis(500))
            .with_timeout(Duration::from_millis(400))
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap();

        assert_eq!(artifact.data().as_ref(), b"clip");
    }

    #[rstest]
    #[case::no_samples(json!({ "generateVideoResponse": { "generatedSamples": [] } }), "No videos were generated.")]
    #[case::no_response(json!({}), "No videos were generated.")]
    #[case::no_uri(json!({ "generateVideoResponse": { "generatedSamples": [{ "video": {} }] } }), "Generated video is missing a URI.")]
    #[tokio::test]
    async fn test_unusable_results(#[case] response: serde_json::Value, #[case] expected: &str) {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(done_with(response))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[tokio::test]
    async fn test_operation_error_is_provider_error() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": OPERATION,
                "done": true,
                "error": { "code": 400, "message": "Prompt was blocked." }
            })))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WeathercastError::Provider { status: 400, ref message } if message == "Prompt was blocked."
        ));
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted." }
            })))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();
        assert!(matches!(err, WeathercastError::Provider { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_failed_download_is_transport_error() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        let video_uri = format!("{}/files/gone", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/{OPERATION}")))
            .respond_with(done_with(json!({
                "generateVideoResponse": { "generatedSamples": [{ "video": { "uri": video_uri } }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("Oslo, Norway", &summary())
            .await
            .unwrap_err();
        assert!(matches!(err, WeathercastError::Transport { .. }));
    }

    #[test]
    fn test_model_and_resolution_names() {
        assert_eq!(VeoModel::default().as_str(), "veo-3.1-generate-preview");
        assert_eq!(VeoModel::VeoFast.as_str(), "veo-3.1-fast-generate-preview");
        assert_eq!(Resolution::P1080.as_str(), "1080p");
        assert_eq!(
            serde_json::to_value(VeoModel::VeoFast).unwrap(),
            json!("veo-3.1-fast-generate-preview")
        );
    }
}
