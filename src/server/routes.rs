use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::funnel::{FunnelDefinition, NextStep, SubmissionReceipt, SubmissionRequest};

use super::infra::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct NextStepRequest {
    pub(crate) current_step: String,
    #[serde(default)]
    pub(crate) selected_option: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/funnels/:slug", get(funnel_definition_endpoint))
        .route("/api/v1/funnels/:slug/entry", get(entry_step_endpoint))
        .route("/api/v1/funnels/:slug/next", post(next_step_endpoint))
        .route(
            "/api/v1/funnels/:slug/submissions",
            post(submission_endpoint),
        )
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "starting" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn funnel_definition_endpoint(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FunnelDefinition>, AppError> {
    let definition = state.service.definition(&slug).await?;
    Ok(Json(definition.as_ref().clone()))
}

pub(crate) async fn entry_step_endpoint(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let step = state.service.initial_step(&slug).await?;
    Ok(Json(json!({ "step": step })))
}

pub(crate) async fn next_step_endpoint(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<NextStepRequest>,
) -> Result<Json<NextStep>, AppError> {
    let next = state
        .service
        .next_step(
            &slug,
            &request.current_step,
            request.selected_option.as_deref(),
        )
        .await?;
    Ok(Json(next))
}

pub(crate) async fn submission_endpoint(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<SubmissionRequest>,
) -> Result<Json<SubmissionReceipt>, AppError> {
    let receipt = state.service.submit(&slug, request).await?;
    Ok(Json(receipt))
}
