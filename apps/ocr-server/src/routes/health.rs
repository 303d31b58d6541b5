//! Service metadata and health endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "Ollama OCR API";

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub model: String,
    pub max_file_size_mb: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ollama_connected: bool,
    pub ollama_host: String,
    pub ollama_model: String,
}

/// Rule set the browser-side validator mirrors
#[derive(Serialize)]
pub struct UploadRulesResponse {
    pub allowed_mime_types: Vec<&'static str>,
    pub max_bytes: usize,
    pub max_file_size_mb: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health_check))
        .route("/api/upload-rules", get(upload_rules))
}

async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        model: state.models().current(),
        max_file_size_mb: state.extractor().rules().max_mb(),
    })
}

/// Liveness plus a live connectivity probe against the engine
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.engine().is_reachable().await;

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        ollama_connected: connected,
        ollama_host: state.engine().host().to_string(),
        ollama_model: state.models().current(),
    })
}

async fn upload_rules(State(state): State<AppState>) -> Json<UploadRulesResponse> {
    let rules = state.extractor().rules();
    Json(UploadRulesResponse {
        allowed_mime_types: rules.allowed_mime_types(),
        max_bytes: rules.max_bytes,
        max_file_size_mb: rules.max_mb(),
    })
}
