//! Search pipeline: city → place → forecast → summary → video
//!
//! The [`Orchestrator`] runs the four stages strictly in order and publishes
//! every transition through a `watch` channel. It is the only writer of the
//! state. Each run carries a cancellation token; starting a new run or
//! resetting cancels the previous token, which drops whatever stage future
//! that run was awaiting.

pub mod state;

pub use state::{Phase, PipelineState, Report, RunId};

use crate::config::WeathercastConfig;
use crate::credentials::{CredentialPrompt, Credentials};
use crate::generation::{GeminiSummarizer, Summarizer, VeoSynthesizer, VideoSynthesizer};
use crate::weather::{ForecastProvider, Geocoder, OpenMeteoClient};
use crate::{Result, WeathercastError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// The four collaborators a run calls, in order
#[derive(Clone)]
pub struct Stages {
    pub geocoder: Arc<dyn Geocoder>,
    pub forecast: Arc<dyn ForecastProvider>,
    pub summarizer: Arc<dyn Summarizer>,
    pub synthesizer: Arc<dyn VideoSynthesizer>,
}

impl Stages {
    /// Open-Meteo for weather, Gemini and Veo for generation
    pub fn from_config(config: &WeathercastConfig, credentials: &Credentials) -> Result<Self> {
        let open_meteo = Arc::new(OpenMeteoClient::new(&config.weather)?);
        Ok(Self {
            geocoder: open_meteo.clone(),
            forecast: open_meteo,
            summarizer: Arc::new(GeminiSummarizer::new(
                &config.generation,
                credentials.clone(),
            )?),
            synthesizer: Arc::new(VeoSynthesizer::new(
                &config.generation,
                credentials.clone(),
            )?),
        })
    }
}

struct ActiveRun {
    id: RunId,
    token: CancellationToken,
}

struct Inner {
    stages: Stages,
    credentials: Credentials,
    prompt: Arc<dyn CredentialPrompt>,
    state: watch::Sender<PipelineState>,
    active: Mutex<Option<ActiveRun>>,
    next_run: AtomicU64,
}

/// Sequences the stages and owns the single [`PipelineState`]
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        stages: Stages,
        credentials: Credentials,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            inner: Arc::new(Inner {
                stages,
                credentials,
                prompt,
                state,
                active: Mutex::new(None),
                next_run: AtomicU64::new(1),
            }),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.inner.state.borrow().clone()
    }

    /// Observe every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// Execute one search to completion and return the state it ended in
    ///
    /// Fails with `Validation` for blank input, leaving the state untouched,
    /// and with `Cancelled` if another run or a reset superseded this one.
    pub async fn run(&self, city: &str) -> Result<PipelineState> {
        let city = normalize_city(city)?;
        let (id, token) = self.begin();
        self.execute(id, token, city).await
    }

    /// Start a search in the background
    pub fn submit(&self, city: &str) -> Result<RunId> {
        let city = normalize_city(city)?;
        let (id, token) = self.begin();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            if let Err(err) = orchestrator.execute(id, token, city).await {
                info!(run = %id, "run ended early: {err}");
            }
        });
        Ok(id)
    }

    /// Cancel any in-flight run and go back to `Idle`
    ///
    /// Dropping the previous state releases its video artifact.
    pub fn reset(&self) {
        let previous = {
            let mut active = self.lock_active();
            if let Some(run) = active.take() {
                run.token.cancel();
            }
            self.inner.state.send_replace(PipelineState::Idle)
        };
        info!(from = %previous.phase(), "pipeline reset");
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveRun>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new run, cancelling the one it supersedes
    fn begin(&self) -> (RunId, CancellationToken) {
        let id = RunId(self.inner.next_run.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();

        let mut active = self.lock_active();
        if let Some(previous) = active.replace(ActiveRun {
            id,
            token: token.clone(),
        }) {
            info!(run = %previous.id, superseded_by = %id, "cancelling previous run");
            previous.token.cancel();
        }
        (id, token)
    }

    /// Publish `state` if `id` is still the active run
    fn transition(&self, id: RunId, state: PipelineState) -> Result<()> {
        let previous = {
            let active = self.lock_active();
            match active.as_ref() {
                Some(run) if run.id == id => self.inner.state.send_replace(state),
                _ => return Err(WeathercastError::Cancelled),
            }
        };
        // The old state may hold the last reference to a report
        drop(previous);
        Ok(())
    }

    /// Publish a terminal state and retire the run
    fn finish(&self, id: RunId, state: PipelineState) -> Result<PipelineState> {
        let mut active = self.lock_active();
        match active.as_ref() {
            Some(run) if run.id == id => {
                *active = None;
                self.inner.state.send_replace(state.clone());
                Ok(state)
            }
            _ => Err(WeathercastError::Cancelled),
        }
    }

    async fn execute(
        &self,
        id: RunId,
        token: CancellationToken,
        city: String,
    ) -> Result<PipelineState> {
        let span = info_span!("run", run = %id, city = %city);
        async move {
            if !self.inner.credentials.is_selected() {
                return self.await_credential(id, &token, city).await;
            }

            let start = Instant::now();
            match self.stages(id, &token, city).await {
                Ok(report) => {
                    info!(
                        "Run completed for {} in {:.1}s",
                        report.place.display_name(),
                        start.elapsed().as_secs_f64()
                    );
                    self.finish(id, PipelineState::Success(Arc::new(report)))
                }
                Err(WeathercastError::Cancelled) => Err(WeathercastError::Cancelled),
                Err(err) => {
                    error!(code = ?err.code(), "run failed: {err}");
                    self.finish(
                        id,
                        PipelineState::Error {
                            message: err.user_message(),
                            code: err.code(),
                        },
                    )
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn await_credential(
        &self,
        id: RunId,
        token: &CancellationToken,
        city: String,
    ) -> Result<PipelineState> {
        self.transition(id, PipelineState::AwaitingCredential { city })?;

        let prompt = self.inner.prompt.clone();
        if let Err(err) = guarded(token, prompt.request_selection(&self.inner.credentials)).await {
            if matches!(err, WeathercastError::Cancelled) {
                return Err(err);
            }
            warn!("credential prompt failed: {err}");
        }
        // Selecting a key does not resume the run; the user searches again.
        self.finish(id, self.state())
    }

    async fn stages(&self, id: RunId, token: &CancellationToken, city: String) -> Result<Report> {
        let stages = &self.inner.stages;

        self.transition(id, PipelineState::FetchingWeather { city: city.clone() })?;
        let place = guarded(token, stages.geocoder.resolve(&city)).await?;
        info!(place = %place.display_name(), coordinates = %place.format_coordinates(), "resolved place");
        let forecast = guarded(
            token,
            stages.forecast.forecast(place.latitude, place.longitude),
        )
        .await?
        .daily;

        self.transition(
            id,
            PipelineState::GeneratingSummary {
                place: place.clone(),
                forecast: forecast.clone(),
            },
        )?;
        let summary = guarded(token, stages.summarizer.summarize(&place, &forecast)).await?;

        self.transition(
            id,
            PipelineState::GeneratingVideo {
                place: place.clone(),
                forecast: forecast.clone(),
                summary: summary.clone(),
            },
        )?;
        let video = guarded(token, stages.synthesizer.synthesize(&place.name, &summary)).await?;

        Ok(Report {
            place,
            forecast,
            summary,
            video,
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.inner.state.borrow().phase())
            .finish_non_exhaustive()
    }
}

/// Race a stage against the run's token; cancellation drops the stage
async fn guarded<T>(
    token: &CancellationToken,
    stage: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(WeathercastError::Cancelled),
        result = stage => result,
    }
}

fn normalize_city(city: &str) -> Result<String> {
    let city = city.trim();
    if city.is_empty() {
        return Err(WeathercastError::validation("City name cannot be empty"));
    }
    Ok(city.to_string())
}
