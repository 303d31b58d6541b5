//! Model management
//!
//! Read and write operations against the engine's model API. None of this
//! is on the extraction hot path.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::registry::{is_vision_model, ModelRegistry, RegistryError};
use crate::error::{AppError, Result};
use crate::ocr::{InferenceEngine, PullOutcome};

/// Installed, supported and current models
#[derive(Debug, Clone, Serialize)]
pub struct ModelCatalog {
    pub available_models: Vec<String>,
    pub supported_models: Vec<String>,
    pub current_model: String,
    pub all_models: Vec<String>,
}

/// Engine connectivity summary
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EngineStatus {
    Connected {
        host: String,
        current_model: String,
        total_models: usize,
    },
    Disconnected {
        host: String,
        current_model: String,
        error: String,
    },
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        AppError::model_rejected(e.to_string())
    }
}

pub struct ModelManager {
    engine: Arc<dyn InferenceEngine>,
    registry: ModelRegistry,
    auto_pull: bool,
    pull_timeout: Duration,
}

impl ModelManager {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        registry: ModelRegistry,
        auto_pull: bool,
        pull_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            registry,
            auto_pull,
            pull_timeout,
        }
    }

    /// Snapshot of the current model
    pub fn current(&self) -> String {
        self.registry.current()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub async fn catalog(&self) -> Result<ModelCatalog> {
        let all_models = self.engine.list_models().await?;
        let available_models = all_models
            .iter()
            .filter(|m| is_vision_model(m) || self.registry.is_supported(m))
            .cloned()
            .collect();

        Ok(ModelCatalog {
            available_models,
            supported_models: self.registry.supported().to_vec(),
            current_model: self.registry.current(),
            all_models,
        })
    }

    pub async fn status(&self) -> EngineStatus {
        let host = self.engine.host().to_string();
        let current_model = self.registry.current();

        match self.engine.list_models().await {
            Ok(models) => EngineStatus::Connected {
                host,
                current_model,
                total_models: models.len(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Engine status check failed");
                EngineStatus::Disconnected {
                    host,
                    current_model,
                    error: "Cannot connect to Ollama".to_string(),
                }
            }
        }
    }

    /// Switch the active model.
    ///
    /// The current model only changes once every check has passed; a
    /// rejected or failed switch leaves it untouched.
    pub async fn switch(&self, model: &str) -> Result<String> {
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::model_rejected("Model name required"));
        }
        self.registry.check(model)?;

        let installed = self.engine.list_models().await?;
        if !installed.iter().any(|m| m == model) {
            if !self.auto_pull {
                return Err(AppError::model_rejected(format!(
                    "Model '{}' not found in Ollama. Pull it first with: ollama pull {}",
                    model, model
                )));
            }
            tracing::info!(%model, "Model not installed, pulling before switch");
            self.pull_bounded(model).await?;
        }

        let previous = self.registry.set_current(model)?;
        tracing::info!(%previous, current = %model, "Switched model");
        Ok(model.to_string())
    }

    /// Download a supported model
    pub async fn pull(&self, model: &str) -> Result<PullOutcome> {
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::model_rejected("Model name required"));
        }
        self.registry.check(model)?;
        self.pull_bounded(model).await
    }

    async fn pull_bounded(&self, model: &str) -> Result<PullOutcome> {
        tracing::info!(%model, timeout_secs = self.pull_timeout.as_secs(), "Pulling model");
        let outcome = tokio::time::timeout(self.pull_timeout, self.engine.pull_model(model))
            .await
            .map_err(|_| {
                AppError::EngineTimeout(format!(
                    "Downloading model '{}' timed out after {} seconds",
                    model,
                    self.pull_timeout.as_secs()
                ))
            })??;
        tracing::info!(%model, status = %outcome.status, "Model pull finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEngine;
    use axum::http::StatusCode;

    fn manager(engine: Arc<MockEngine>, auto_pull: bool) -> ModelManager {
        ModelManager::new(
            engine,
            ModelRegistry::new(
                vec!["moondream:1.8b".to_string(), "llava:latest".to_string()],
                None,
            ),
            auto_pull,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_catalog() {
        let engine = Arc::new(
            MockEngine::replying("").with_installed(&["llava:latest", "llama3:8b", "moondream:1.8b"]),
        );
        let catalog = manager(engine, false).catalog().await.unwrap();

        assert_eq!(catalog.available_models, vec!["llava:latest", "moondream:1.8b"]);
        assert_eq!(catalog.all_models.len(), 3);
        assert_eq!(catalog.supported_models, vec!["moondream:1.8b", "llava:latest"]);
        assert_eq!(catalog.current_model, "moondream:1.8b");
    }

    #[tokio::test]
    async fn test_catalog_engine_down() {
        let engine = Arc::new(MockEngine::unreachable());
        let err = manager(engine, false).catalog().await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_switch_installed_model() {
        let engine = Arc::new(MockEngine::replying("").with_installed(&["llava:latest"]));
        let manager = manager(engine.clone(), false);

        assert_eq!(manager.switch("llava:latest").await.unwrap(), "llava:latest");
        assert_eq!(manager.current(), "llava:latest");
        assert_eq!(engine.pull_calls(), 0);
    }

    #[tokio::test]
    async fn test_switch_unsupported_is_rejected_without_mutation() {
        let engine = Arc::new(MockEngine::replying("").with_installed(&["gpt-4o"]));
        let manager = manager(engine, false);

        let err = manager.switch("gpt-4o").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(manager.current(), "moondream:1.8b");
    }

    #[tokio::test]
    async fn test_switch_missing_model_without_auto_pull() {
        let engine = Arc::new(MockEngine::replying("").with_installed(&["moondream:1.8b"]));
        let manager = manager(engine.clone(), false);

        let err = manager.switch("llava:latest").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(manager.current(), "moondream:1.8b");
        assert_eq!(engine.pull_calls(), 0);
    }

    #[tokio::test]
    async fn test_switch_with_auto_pull() {
        let engine = Arc::new(MockEngine::replying("").with_installed(&["moondream:1.8b"]));
        let manager = manager(engine.clone(), true);

        manager.switch("llava:latest").await.unwrap();
        assert_eq!(engine.pull_calls(), 1);
        assert_eq!(manager.current(), "llava:latest");
    }

    #[tokio::test]
    async fn test_auto_pull_timeout_keeps_model() {
        let engine = Arc::new(
            MockEngine::replying("")
                .with_installed(&[])
                .with_pull_delay(Duration::from_secs(5)),
        );
        let manager = manager(engine, true);

        let err = manager.switch("llava:latest").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(manager.current(), "moondream:1.8b");
    }

    #[tokio::test]
    async fn test_switch_engine_down() {
        let engine = Arc::new(MockEngine::unreachable());
        let manager = manager(engine, true);

        let err = manager.switch("llava:latest").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(manager.current(), "moondream:1.8b");
    }

    #[tokio::test]
    async fn test_pull_rejects_unsupported() {
        let engine = Arc::new(MockEngine::replying(""));
        let manager = manager(engine.clone(), false);

        let err = manager.pull("gpt-4o").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(engine.pull_calls(), 0);

        let outcome = manager.pull("llava:latest").await.unwrap();
        assert_eq!(outcome.status, "success");
    }

    #[tokio::test]
    async fn test_status() {
        let up = manager(Arc::new(MockEngine::replying("").with_installed(&["a", "b"])), false);
        match up.status().await {
            EngineStatus::Connected { total_models, .. } => assert_eq!(total_models, 2),
            other => panic!("unexpected status: {other:?}"),
        }

        let down = manager(Arc::new(MockEngine::unreachable()), false);
        assert!(matches!(down.status().await, EngineStatus::Disconnected { .. }));
    }

    #[test]
    fn test_status_serialization() {
        let status = EngineStatus::Connected {
            host: "http://localhost:11434".into(),
            current_model: "llava".into(),
            total_models: 3,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({
                "status": "connected",
                "host": "http://localhost:11434",
                "current_model": "llava",
                "total_models": 3
            })
        );
    }

    #[test]
    fn test_registry_error_maps_to_bad_request() {
        let err: AppError = RegistryError::Unsupported {
            model: "x".into(),
            supported: "a".into(),
        }
        .into();
        assert_eq!(err.kind(), "model_error");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
