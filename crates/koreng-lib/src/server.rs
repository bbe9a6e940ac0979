//! HTTP API for the drill engine.
//!
//! Every user-facing control maps to one route. CORS-permissive so a browser
//! front end on another localhost port can drive it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use koreng_core::error::SessionError;
use koreng_core::types::{RateFactor, SessionStatus};

use crate::drill::{DrillEngine, VoiceLists};

/// Build the axum router with a shared [`DrillEngine`].
pub fn router(engine: DrillEngine) -> Router {
    Router::new()
        .route("/subjects", get(subjects))
        .route("/select", post(select))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/reset", post(reset))
        .route("/repeat", post(repeat))
        .route("/rate", post(rate))
        .route("/voices", get(voices).post(set_voices))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

/// Rejected transition → 4xx with the reason.
struct ApiError(StatusCode, String);

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let code = match &e {
            SessionError::UnknownSubject(_) => StatusCode::NOT_FOUND,
            SessionError::EngineGone => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };
        Self(code, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            error: self.1,
        };
        (self.0, Json(body)).into_response()
    }
}

#[derive(serde::Serialize)]
struct SubjectsResponse {
    subjects: Vec<String>,
}

async fn subjects(State(engine): State<DrillEngine>) -> Json<SubjectsResponse> {
    Json(SubjectsResponse {
        subjects: engine.list_subjects(),
    })
}

#[derive(serde::Deserialize)]
struct SelectRequest {
    subject: String,
}

async fn select(
    State(engine): State<DrillEngine>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    engine.select_subject(&req.subject).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn start(State(engine): State<DrillEngine>) -> Result<Json<OkResponse>, ApiError> {
    engine.start().await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn stop(State(engine): State<DrillEngine>) -> Json<OkResponse> {
    engine.stop();
    Json(OkResponse { ok: true })
}

async fn reset(State(engine): State<DrillEngine>) -> Json<OkResponse> {
    engine.reset();
    Json(OkResponse { ok: true })
}

#[derive(serde::Deserialize)]
struct RepeatRequest {
    enabled: bool,
}

async fn repeat(
    State(engine): State<DrillEngine>,
    Json(req): Json<RepeatRequest>,
) -> Json<OkResponse> {
    engine.set_repeat(req.enabled);
    Json(OkResponse { ok: true })
}

#[derive(serde::Deserialize)]
struct RateRequest {
    rate: RateFactor,
}

async fn rate(State(engine): State<DrillEngine>, Json(req): Json<RateRequest>) -> Json<OkResponse> {
    engine.set_rate(req.rate);
    Json(OkResponse { ok: true })
}

async fn voices(State(engine): State<DrillEngine>) -> Result<Json<VoiceLists>, ApiError> {
    engine
        .voices()
        .await
        .map(Json)
        .map_err(|e| ApiError(StatusCode::BAD_GATEWAY, e.to_string()))
}

#[derive(serde::Deserialize)]
struct VoicesRequest {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

async fn set_voices(
    State(engine): State<DrillEngine>,
    Json(req): Json<VoicesRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    engine.set_voices(req.source, req.target).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn status(State(engine): State<DrillEngine>) -> Json<SessionStatus> {
    Json(engine.status())
}
