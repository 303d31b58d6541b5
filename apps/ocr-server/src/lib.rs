//! Ollama OCR server
//!
//! A thin backend between a browser upload form and a locally running
//! Ollama instance. Uploaded images are validated by content, forwarded to a
//! vision model and the transcribed text is returned as JSON.
//!
//! The binary in `main.rs` wires [`state::AppState::from_config`] into
//! [`app`]; tests build the same router over a mock engine.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod models;
pub mod ocr;
pub mod routes;
pub mod state;
pub mod upload;

#[cfg(test)]
mod test_support;

use state::AppState;
use upload::BYTES_PER_MB;

/// Build the full router for the given state
pub fn app(state: AppState) -> Router {
    // Room for a file just over the ceiling plus form overhead, so the
    // validator sees it and reports the real size
    let body_limit = state
        .extractor()
        .rules()
        .max_bytes
        .saturating_mul(2)
        .saturating_add(BYTES_PER_MB);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::extract::router())
        .merge(routes::models::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config().server.allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
