//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::models::{load_supported_models, ModelManager, ModelRegistry};
use crate::ocr::{EngineError, ExtractionService, InferenceEngine, OllamaClient};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize Ollama client: {0}")]
    EngineInit(#[from] EngineError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    engine: Arc<dyn InferenceEngine>,
    extractor: ExtractionService,
    models: ModelManager,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<dyn InferenceEngine>,
        extractor: ExtractionService,
        models: ModelManager,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                extractor,
                models,
            }),
        }
    }

    /// Build the state for a running server: Ollama client, supported
    /// models from disk, extraction service.
    pub fn from_config(config: Config) -> Result<Self, StateError> {
        let engine: Arc<dyn InferenceEngine> = Arc::new(OllamaClient::new(
            &config.ollama.host,
            config.ollama.request_timeout,
            config.models.pull_timeout,
        )?);

        let supported = load_supported_models(&config.models.models_file);
        tracing::info!(count = supported.len(), "Loaded supported models");
        let registry = ModelRegistry::new(supported, config.ollama.model.clone());

        let extractor = ExtractionService::new(
            engine.clone(),
            config.image_rules(),
            config.ollama.request_timeout,
        );
        let models = ModelManager::new(
            engine.clone(),
            registry,
            config.models.auto_pull,
            config.models.pull_timeout,
        );

        Ok(Self::new(config, engine, extractor, models))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the inference engine
    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.inner.engine
    }

    /// Get the extraction service
    pub fn extractor(&self) -> &ExtractionService {
        &self.inner.extractor
    }

    /// Get the model manager
    pub fn models(&self) -> &ModelManager {
        &self.inner.models
    }
}
