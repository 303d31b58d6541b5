//! Inference engine client
//!
//! Defines the engine trait and the Ollama implementation. Extraction tries
//! `/api/chat` first and falls back to `/api/generate` exactly once when the
//! chat endpoint does not exist.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{
    Attempt, ChatResponse, Endpoint, EngineError, EngineReply, ExtractionRequest,
    GenerateResponse, PullOutcome, PullResponse, TagsResponse,
};

/// Timeout for lightweight management calls (tags, health)
const MANAGEMENT_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Inference engine trait
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Base address of the engine
    fn host(&self) -> &str;

    /// Check if the engine answers at all
    async fn is_reachable(&self) -> bool;

    /// Names of installed models
    async fn list_models(&self) -> Result<Vec<String>, EngineError>;

    /// Run extraction on an encoded image
    async fn extract(&self, request: &ExtractionRequest) -> Result<EngineReply, EngineError>;

    /// Download a model, blocking until the engine reports completion
    async fn pull_model(&self, model: &str) -> Result<PullOutcome, EngineError>;
}

/// Ollama HTTP client
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    pull_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, request_timeout: Duration, pull_timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::ConnectionFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            pull_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn payload(endpoint: Endpoint, request: &ExtractionRequest) -> serde_json::Value {
        match endpoint {
            Endpoint::Chat => serde_json::json!({
                "model": request.model,
                "messages": [
                    {
                        "role": "system",
                        "content": request.system_prompt
                    },
                    {
                        "role": "user",
                        "content": request.prompt,
                        "images": [request.image_base64]
                    }
                ],
                "stream": false
            }),
            Endpoint::Generate => serde_json::json!({
                "model": request.model,
                "system": request.system_prompt,
                "prompt": request.prompt,
                "images": [request.image_base64],
                "stream": false
            }),
        }
    }

    /// Single attempt against one endpoint
    async fn call(&self, endpoint: Endpoint, request: &ExtractionRequest) -> Result<EngineReply, EngineError> {
        let response = self
            .http
            .post(self.url(endpoint.path()))
            .timeout(self.request_timeout)
            .json(&Self::payload(endpoint, request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body, endpoint.path(), &request.model));
        }

        let reply = match endpoint {
            Endpoint::Chat => response.json::<ChatResponse>().await?.into_reply(),
            Endpoint::Generate => response.json::<GenerateResponse>().await?.into_reply(),
        };
        Ok(reply)
    }
}

/// Map a non-success engine status onto the error taxonomy.
///
/// Ollama answers 404 both for unknown routes and for missing models; the
/// body tells them apart.
fn classify_failure(status: StatusCode, body: String, path: &str, model: &str) -> EngineError {
    if status == StatusCode::NOT_FOUND {
        if body.to_lowercase().contains("model") {
            EngineError::ModelNotFound(model.to_string())
        } else {
            EngineError::EndpointNotFound(path.to_string())
        }
    } else {
        EngineError::Upstream {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl InferenceEngine for OllamaClient {
    fn host(&self) -> &str {
        &self.base_url
    }

    async fn is_reachable(&self) -> bool {
        match self
            .http
            .get(self.url("/api/tags"))
            .timeout(MANAGEMENT_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, EngineError> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .timeout(MANAGEMENT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<EngineReply, EngineError> {
        match Attempt::from(self.call(Endpoint::Chat, request).await) {
            Attempt::Succeeded(reply) => Ok(reply),
            Attempt::Failed(e) => Err(e),
            Attempt::RetryOnFallback(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = Endpoint::Generate.path(),
                    "Chat endpoint unavailable, falling back"
                );
                self.call(Endpoint::Generate, request).await
            }
        }
    }

    async fn pull_model(&self, model: &str) -> Result<PullOutcome, EngineError> {
        let response = self
            .http
            .post(self.url("/api/pull"))
            .timeout(self.pull_timeout)
            .json(&serde_json::json!({
                "model": model,
                "name": model,
                "stream": false
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<PullResponse>(&body).ok();

        if let Some(error) = parsed.as_ref().and_then(|p| p.error.as_deref()) {
            if error.contains("file does not exist") || error.contains("not found") {
                return Err(EngineError::ModelNotFound(model.to_string()));
            }
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body: error.to_string(),
            });
        }

        if !status.is_success() {
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let status = parsed
            .and_then(|p| p.status)
            .unwrap_or_else(|| "success".to_string());
        Ok(PullOutcome { status })
    }
}
