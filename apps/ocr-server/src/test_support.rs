//! Test doubles shared by unit and router tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use parking_lot::Mutex;

use crate::config::Config;
use crate::models::{ModelManager, ModelRegistry};
use crate::ocr::{
    EngineError, EngineReply, Endpoint, ExtractionRequest, ExtractionService, InferenceEngine,
    PullOutcome, TokenUsage,
};
use crate::state::AppState;

/// Canned extraction behaviour
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(EngineError),
    Stall(Duration),
}

/// In-memory inference engine that records what it was asked to do
pub struct MockEngine {
    reply: MockReply,
    reachable: bool,
    installed: Vec<String>,
    pull_delay: Duration,
    extract_calls: AtomicUsize,
    pull_calls: AtomicUsize,
    last_request: Mutex<Option<ExtractionRequest>>,
}

impl MockEngine {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            reachable: true,
            installed: vec!["moondream:1.8b".to_string(), "llava:latest".to_string()],
            pull_delay: Duration::ZERO,
            extract_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockReply::Text(text.to_string()))
    }

    /// Engine process that is not running
    pub fn unreachable() -> Self {
        let mut engine = Self::new(MockReply::Fail(EngineError::ConnectionFailed(
            "connection refused".to_string(),
        )));
        engine.reachable = false;
        engine
    }

    pub fn with_installed(mut self, models: &[&str]) -> Self {
        self.installed = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ExtractionRequest> {
        self.last_request.lock().clone()
    }

    fn refused() -> EngineError {
        EngineError::ConnectionFailed("connection refused".to_string())
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    fn host(&self) -> &str {
        "http://mock-ollama:11434"
    }

    async fn is_reachable(&self) -> bool {
        self.reachable
    }

    async fn list_models(&self) -> Result<Vec<String>, EngineError> {
        if !self.reachable {
            return Err(Self::refused());
        }
        Ok(self.installed.clone())
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<EngineReply, EngineError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        match &self.reply {
            MockReply::Text(text) => Ok(EngineReply {
                text: text.clone(),
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                }),
                endpoint: Endpoint::Chat,
            }),
            MockReply::Fail(e) => Err(e.clone()),
            MockReply::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Err(EngineError::Timeout)
            }
        }
    }

    async fn pull_model(&self, _model: &str) -> Result<PullOutcome, EngineError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(Self::refused());
        }
        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }
        Ok(PullOutcome {
            status: "success".to_string(),
        })
    }
}

/// Application state wired to a mock engine
pub fn test_state(engine: Arc<MockEngine>, config: Config) -> AppState {
    let registry = ModelRegistry::new(
        vec!["moondream:1.8b".to_string(), "llava:latest".to_string()],
        config.ollama.model.clone(),
    );
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
    AppState::new(config, engine, extractor, models)
}

/// Build a multipart/form-data upload request
pub fn multipart_request(
    uri: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let boundary = "----ocr-server-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Read a JSON response body
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
