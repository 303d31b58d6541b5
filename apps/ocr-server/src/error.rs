//! Error types for the OCR server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocr::EngineError;
use crate::upload::ValidationError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
///
/// Messages carried here are safe to show to a client. Raw engine output
/// and connection details are logged when the error is created and never
/// stored in the variant.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    EngineUnavailable(String),

    #[error("{0}")]
    EngineTimeout(String),

    #[error("{message}")]
    Model { message: String, status: StatusCode },

    #[error("{0}")]
    Engine(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn model_rejected(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Model { status, .. } => *status,
            Self::Engine(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::EngineTimeout(_) => "engine_timeout",
            Self::Model { .. } => "model_error",
            Self::Engine(_) => "engine_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Specific reason for a rejected upload
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Validation(e) => Some(e.reason()),
            _ => None,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ConnectionFailed(detail) => {
                tracing::error!(%detail, "Inference engine unreachable");
                AppError::EngineUnavailable(
                    "Cannot connect to Ollama. Make sure Ollama is running at the configured host."
                        .to_string(),
                )
            }
            EngineError::EndpointNotFound(path) => {
                tracing::error!(%path, "Inference engine endpoint missing");
                AppError::EngineUnavailable(
                    "Ollama did not accept /api/chat or /api/generate. Make sure Ollama is running and up to date."
                        .to_string(),
                )
            }
            EngineError::ModelNotFound(model) => AppError::model_unavailable(format!(
                "Model '{}' not found. Try running: ollama pull {}",
                model, model
            )),
            EngineError::Timeout => AppError::EngineTimeout(
                "Request to Ollama timed out. The image processing is taking too long.".to_string(),
            ),
            EngineError::Upstream { status, body } => {
                tracing::error!(status, %body, "Inference engine returned an error");
                AppError::Engine(format!("Ollama returned HTTP {}", status))
            }
            EngineError::InvalidResponse(detail) => {
                tracing::error!(%detail, "Inference engine response could not be parsed");
                AppError::Engine("Ollama returned an unreadable response".to_string())
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            detail,
            code: status.as_u16(),
            reason: self.reason().map(str::to_string),
        });

        (status, body).into_response()
    }
}
