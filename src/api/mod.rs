//! JSON API over the pipeline orchestrator

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    WeathercastError,
    credentials::{ApiKey, Credentials},
    error::ErrorCode,
    models::{ArtifactId, DailyForecast, Place, Summary},
    pipeline::{Orchestrator, Phase, PipelineState, RunId},
};

#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub credentials: Credentials,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let credentials = orchestrator.credentials().clone();
        Self {
            orchestrator,
            credentials,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ApiError {
    pub message: String,
    pub code: ErrorCode,
}

/// Pipeline state as exposed to the front-end
#[derive(Serialize, Debug)]
pub struct ApiState {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<DailyForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<ArtifactId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl From<&PipelineState> for ApiState {
    fn from(state: &PipelineState) -> Self {
        let mut api = Self {
            phase: state.phase(),
            status: state.status_text(),
            city: None,
            place: state.place().cloned(),
            forecast: None,
            summary: state.summary().cloned(),
            video_id: None,
            video_url: None,
            error: None,
        };

        match state {
            PipelineState::AwaitingCredential { city } | PipelineState::FetchingWeather { city } => {
                api.city = Some(city.clone());
            }
            PipelineState::GeneratingSummary { forecast, .. }
            | PipelineState::GeneratingVideo { forecast, .. } => {
                api.forecast = Some(forecast.clone());
            }
            PipelineState::Success(report) => {
                let id = report.video.id();
                api.forecast = Some(report.forecast.clone());
                api.video_id = Some(id);
                api.video_url = Some(format!("/api/video/{id}"));
            }
            PipelineState::Error { message, code } => {
                api.error = Some(ApiError {
                    message: message.clone(),
                    code: *code,
                });
            }
            PipelineState::Idle => {}
        }
        api
    }
}

#[derive(Deserialize, Debug)]
pub struct SearchRequest {
    pub city: String,
}

#[derive(Serialize, Debug)]
pub struct SearchResponse {
    pub run_id: RunId,
}

#[derive(Deserialize, Debug)]
pub struct CredentialRequest {
    pub api_key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CredentialStatus {
    pub selected: bool,
}

impl IntoResponse for WeathercastError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiError {
            message: self.user_message(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/search", post(search))
        .route("/reset", post(reset))
        .route(
            "/credential",
            get(get_credential)
                .post(select_credential)
                .delete(clear_credential),
        )
        .route("/video/{id}", get(get_video))
        .with_state(state)
}

async fn get_state(State(state): State<AppState>) -> Json<ApiState> {
    Json(ApiState::from(&state.orchestrator.state()))
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SearchResponse>), WeathercastError> {
    let run_id = state.orchestrator.submit(&request.city)?;
    Ok((StatusCode::ACCEPTED, Json(SearchResponse { run_id })))
}

async fn reset(State(state): State<AppState>) -> Json<ApiState> {
    state.orchestrator.reset();
    Json(ApiState::from(&state.orchestrator.state()))
}

async fn get_credential(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(CredentialStatus {
        selected: state.credentials.is_selected(),
    })
}

async fn select_credential(
    State(state): State<AppState>,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<CredentialStatus>, WeathercastError> {
    state.credentials.select(ApiKey::new(request.api_key)?);
    Ok(Json(CredentialStatus { selected: true }))
}

async fn clear_credential(State(state): State<AppState>) -> Json<CredentialStatus> {
    state.credentials.clear();
    Json(CredentialStatus { selected: false })
}

async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, StatusCode> {
    let current = state.orchestrator.state();
    let report = current
        .report()
        .filter(|report| report.video.id() == ArtifactId::from(id))
        .ok_or(StatusCode::NOT_FOUND)?;

    let video = &report.video;
    Ok((
        [(header::CONTENT_TYPE, video.mime_type().to_string())],
        video.data().clone(),
    )
        .into_response())
}
