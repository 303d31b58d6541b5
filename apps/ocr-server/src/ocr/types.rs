//! OCR Types
//!
//! Internal extraction types plus the boundary shapes of the Ollama API.
//! Engine responses vary between Ollama versions, so every wire field is
//! optional and normalized into [`EngineReply`] as soon as it is parsed.

use serde::{Deserialize, Serialize};

// ============================================================================
// Extraction
// ============================================================================

/// Inference endpoint flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Structured `/api/chat` (preferred)
    Chat,
    /// Plain `/api/generate` (fallback)
    Generate,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "/api/chat",
            Self::Generate => "/api/generate",
        }
    }
}

/// Request sent to the inference engine
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub model: String,
    /// Base64-encoded image
    pub image_base64: String,
    /// Fixed instruction describing the output we want
    pub system_prompt: String,
    pub prompt: String,
}

/// Token usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Raw engine output before text normalization
#[derive(Debug, Clone, PartialEq)]
pub struct EngineReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub endpoint: Endpoint,
}

/// Final extraction result returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Result of a model download
#[derive(Debug, Clone, PartialEq)]
pub struct PullOutcome {
    /// Final status line reported by the engine
    pub status: String,
}

// ============================================================================
// Fallback Strategy
// ============================================================================

/// Outcome of a single endpoint attempt
#[derive(Debug)]
pub enum Attempt {
    Succeeded(EngineReply),
    /// The endpoint does not exist; the other one may
    RetryOnFallback(EngineError),
    Failed(EngineError),
}

impl From<Result<EngineReply, EngineError>> for Attempt {
    fn from(result: Result<EngineReply, EngineError>) -> Self {
        match result {
            Ok(reply) => Self::Succeeded(reply),
            Err(e @ EngineError::EndpointNotFound(_)) => Self::RetryOnFallback(e),
            Err(e) => Self::Failed(e),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Inference engine errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to connect to inference engine: {0}")]
    ConnectionFailed(String),

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Inference engine request timed out")]
    Timeout,

    #[error("Inference engine returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid response from inference engine: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        // A connect timeout sets both flags; it means the engine is unreachable
        if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::ConnectionFailed(e.to_string())
        }
    }
}

// ============================================================================
// Ollama Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    pub content: Option<String>,
}

/// `/api/chat` response
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub message: Option<WireMessage>,
    pub usage: Option<WireUsage>,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
}

/// `/api/generate` response
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub response: Option<String>,
    pub usage: Option<WireUsage>,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Prefer an explicit `usage` object; fall back to Ollama's eval counters.
pub(crate) fn normalize_usage(
    usage: Option<WireUsage>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
) -> Option<TokenUsage> {
    if let Some(usage) = usage {
        let prompt_tokens = usage.prompt_tokens.unwrap_or(0);
        let completion_tokens = usage.completion_tokens.unwrap_or(0);
        return Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: usage
                .total_tokens
                .unwrap_or(prompt_tokens + completion_tokens),
        });
    }

    if prompt_eval_count.is_none() && eval_count.is_none() {
        return None;
    }

    let prompt_tokens = prompt_eval_count.unwrap_or(0);
    let completion_tokens = eval_count.unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    })
}

impl ChatResponse {
    pub(crate) fn into_reply(self) -> EngineReply {
        EngineReply {
            text: self.message.and_then(|m| m.content).unwrap_or_default(),
            usage: normalize_usage(self.usage, self.prompt_eval_count, self.eval_count),
            endpoint: Endpoint::Chat,
        }
    }
}

impl GenerateResponse {
    pub(crate) fn into_reply(self) -> EngineReply {
        EngineReply {
            text: self.response.unwrap_or_default(),
            usage: normalize_usage(self.usage, self.prompt_eval_count, self.eval_count),
            endpoint: Endpoint::Generate,
        }
    }
}
