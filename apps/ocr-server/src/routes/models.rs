//! Model management routes

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{EngineStatus, ModelCatalog};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(list_models))
        .route("/api/set-model", post(set_model))
        .route("/api/ollama-status", get(ollama_status))
        .route("/api/pull-model", post(pull_model))
}

#[derive(Debug, Deserialize)]
pub struct ModelRequest {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetModelResponse {
    pub message: String,
    pub current_model: String,
}

#[derive(Debug, Serialize)]
pub struct PullModelResponse {
    pub message: String,
    pub model: String,
    pub output: String,
}

fn model_name(body: std::result::Result<Json<ModelRequest>, JsonRejection>) -> Result<String> {
    let Json(request) = body
        .map_err(|e| AppError::model_rejected(format!("Invalid request body: {}", e.body_text())))?;
    request
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::model_rejected("Model name required"))
}

async fn list_models(State(state): State<AppState>) -> Result<Json<ModelCatalog>> {
    Ok(Json(state.models().catalog().await?))
}

async fn set_model(
    State(state): State<AppState>,
    body: std::result::Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<SetModelResponse>> {
    let model = model_name(body)?;
    let current = state.models().switch(&model).await?;

    Ok(Json(SetModelResponse {
        message: format!("Successfully switched to model: {}", current),
        current_model: current,
    }))
}

async fn ollama_status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.models().status().await)
}

/// Blocks until the engine finishes the download or the pull timeout hits
async fn pull_model(
    State(state): State<AppState>,
    body: std::result::Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<PullModelResponse>> {
    let model = model_name(body)?;
    let outcome = state.models().pull(&model).await?;

    Ok(Json(PullModelResponse {
        message: format!("Successfully pulled model: {}", model),
        model,
        output: outcome.status,
    }))
}
