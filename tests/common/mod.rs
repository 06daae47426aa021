//! Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use weathercast::credentials::{ApiKey, CredentialPrompt, Credentials};
use weathercast::generation::{Summarizer, VideoSynthesizer};
use weathercast::models::{DailyForecast, Place, Summary, VideoArtifact, WeatherReport};
use weathercast::pipeline::{Orchestrator, Phase, PipelineState, Stages};
use weathercast::weather::{ForecastProvider, Geocoder};
use weathercast::{Result, WeathercastError};

pub const UNKNOWN_CITY: &str = "Xyzzyplex";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Geocode,
    Forecast,
    Summarize,
    Synthesize,
}

/// One fake implementing all four stages
///
/// Records every call together with the phase the orchestrator was in when
/// the call was made.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<(String, Option<Phase>)>>,
    pub fail_at: Option<Stage>,
    /// Place name whose video never finishes
    pub stall_video_for: Option<String>,
    pub stalled_video_dropped: Arc<AtomicBool>,
    observer: OnceLock<watch::Receiver<PipelineState>>,
}

impl FakeBackend {
    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn stalling(place: &str) -> Self {
        Self {
            stall_video_for: Some(place.to_string()),
            ..Self::default()
        }
    }

    pub fn observe(&self, orchestrator: &Orchestrator) {
        let _ = self.observer.set(orchestrator.subscribe());
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn phases_seen(&self) -> Vec<Option<Phase>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, phase)| *phase)
            .collect()
    }

    fn record(&self, stage: Stage, name: String) -> Result<()> {
        let phase = self.observer.get().map(|rx| rx.borrow().phase());
        self.calls.lock().unwrap().push((name, phase));
        if self.fail_at == Some(stage) {
            return Err(WeathercastError::transport(format!("{stage:?} failed")));
        }
        Ok(())
    }
}

pub fn place_named(name: &str) -> Place {
    Place {
        id: 2950159,
        name: name.to_string(),
        country: "Germany".to_string(),
        latitude: 52.52437,
        longitude: 13.41053,
    }
}

pub fn seven_day_forecast() -> DailyForecast {
    serde_json::from_value(json!({
        "time": ["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04", "2024-03-05", "2024-03-06", "2024-03-07"],
        "weather_code": [61, 3, 2, 71, 0, 1, 80],
        "temperature_2m_max": [9.5, 8.0, 7.2, 2.1, 5.5, 6.0, 10.3],
        "temperature_2m_min": [3.0, 2.5, 0.4, -3.2, -1.0, 1.1, 4.0],
        "precipitation_sum": [4.2, 0.0, 0.0, 3.5, 0.0, 0.0, 6.1],
        "precipitation_probability_max": [80, 10, 5, 70, 0, 5, 90],
        "wind_speed_10m_max": [20.0, 15.0, 10.0, 25.0, 8.0, 12.0, 30.0],
        "wind_gusts_10m_max": [45.0, 30.0, 22.0, 55.0, 18.0, 25.0, 62.0],
        "snowfall_sum": [0.0, 0.0, 0.0, 2.4, 0.0, 0.0, 0.0]
    }))
    .unwrap()
}

/// Sets a flag when the stalled video future is dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Geocoder for FakeBackend {
    async fn resolve(&self, city: &str) -> Result<Place> {
        self.record(Stage::Geocode, format!("geocode:{city}"))?;
        if city == UNKNOWN_CITY {
            return Err(WeathercastError::not_found(city));
        }
        Ok(place_named(city))
    }
}

#[async_trait]
impl ForecastProvider for FakeBackend {
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<WeatherReport> {
        self.record(Stage::Forecast, "forecast".to_string())?;
        Ok(WeatherReport {
            latitude,
            longitude,
            timezone: Some("Europe/Berlin".to_string()),
            daily: seven_day_forecast(),
            daily_units: json!({}),
        })
    }
}

#[async_trait]
impl Summarizer for FakeBackend {
    async fn summarize(&self, place: &Place, forecast: &DailyForecast) -> Result<Summary> {
        self.record(Stage::Summarize, "summarize".to_string())?;
        Ok(Summary::new(format!(
            "{} days of mixed weather in {}.",
            forecast.len(),
            place.name
        )))
    }
}

#[async_trait]
impl VideoSynthesizer for FakeBackend {
    async fn synthesize(&self, place_name: &str, summary: &Summary) -> Result<VideoArtifact> {
        self.record(Stage::Synthesize, format!("synthesize:{place_name}"))?;
        if self.stall_video_for.as_deref() == Some(place_name) {
            let _flag = DropFlag(self.stalled_video_dropped.clone());
            std::future::pending::<()>().await;
        }
        VideoArtifact::store(
            Bytes::from(format!("video for {place_name}: {summary}")),
            "video/mp4",
            format!("https://videos.example/{place_name}"),
            None,
        )
        .await
    }
}

/// Counts prompts and optionally selects a key
#[derive(Default)]
pub struct CountingPrompt {
    pub shown: AtomicUsize,
    pub key_to_select: Option<String>,
}

#[async_trait]
impl CredentialPrompt for CountingPrompt {
    async fn request_selection(&self, credentials: &Credentials) -> Result<()> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        if let Some(key) = &self.key_to_select {
            credentials.select(ApiKey::new(key.clone())?);
        }
        Ok(())
    }
}

pub fn stages(backend: &Arc<FakeBackend>) -> Stages {
    Stages {
        geocoder: backend.clone(),
        forecast: backend.clone(),
        summarizer: backend.clone(),
        synthesizer: backend.clone(),
    }
}

pub fn with_key() -> Credentials {
    Credentials::with_key(ApiKey::new("test-key").unwrap())
}

/// Orchestrator over `backend` with a selected key
pub fn orchestrator(backend: &Arc<FakeBackend>) -> Orchestrator {
    let orchestrator = Orchestrator::new(
        stages(backend),
        with_key(),
        Arc::new(CountingPrompt::default()),
    );
    backend.observe(&orchestrator);
    orchestrator
}

pub async fn wait_for_phase(orchestrator: &Orchestrator, phase: Phase) -> PipelineState {
    let mut rx = orchestrator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.phase() == phase))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}"))
        .unwrap()
        .clone()
}

pub async fn wait_until(flag: &AtomicBool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("flag was never set");
}
