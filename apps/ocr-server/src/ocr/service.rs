//! Extraction Service
//!
//! Sequences validation, encoding, the engine call and text cleanup for a
//! single upload, and maps every failure onto the client-facing taxonomy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;

use super::{
    client::InferenceEngine,
    normalize::clean_extracted_text,
    types::{ExtractionRequest, ExtractionResult},
};
use crate::error::{AppError, Result};
use crate::upload::{self, ImageRules, UploadedImage};

/// Fixed instruction: transcribe visible text, add nothing
pub const SYSTEM_PROMPT: &str = "You are a text transcription engine. \
Transcribe all text that is visible in the image exactly as written, \
preserving line breaks and spacing where possible. \
Return only the transcribed text. Do not add descriptions, commentary, \
explanations, or formatting such as code fences. \
If the image contains no text, return an empty response.";

pub const USER_PROMPT: &str = "Extract all visible text from this image.";

/// Stages of a single extraction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Rejected,
    Encoding,
    Calling,
    Succeeded,
    EngineUnavailable,
    TimedOut,
    EngineError,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Encoding => "encoding",
            Self::Calling => "calling",
            Self::Succeeded => "succeeded",
            Self::EngineUnavailable => "engine_unavailable",
            Self::TimedOut => "timed_out",
            Self::EngineError => "engine_error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::Succeeded
                | Self::EngineUnavailable
                | Self::TimedOut
                | Self::EngineError
        )
    }

    /// Terminal stage reached by a finished request
    pub fn terminal(result: &Result<ExtractionResult>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(AppError::Validation(_)) => Self::Rejected,
            Err(AppError::EngineUnavailable(_)) => Self::EngineUnavailable,
            Err(AppError::EngineTimeout(_)) => Self::TimedOut,
            Err(_) => Self::EngineError,
        }
    }
}

/// Orchestrates extraction against an inference engine
pub struct ExtractionService {
    engine: Arc<dyn InferenceEngine>,
    rules: ImageRules,
    timeout: Duration,
}

impl ExtractionService {
    pub fn new(engine: Arc<dyn InferenceEngine>, rules: ImageRules, timeout: Duration) -> Self {
        Self {
            engine,
            rules,
            timeout,
        }
    }

    pub fn rules(&self) -> &ImageRules {
        &self.rules
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extract text from an upload using `model`.
    ///
    /// The model name is taken by value: callers snapshot it once per request.
    pub async fn extract(&self, upload: UploadedImage, model: String) -> Result<ExtractionResult> {
        let started = Instant::now();
        let file_name = upload.display_name().to_string();
        tracing::debug!(stage = Stage::Received.as_str(), %file_name, size = upload.bytes.len());

        let result = self.run(upload, model).await;

        let stage = Stage::terminal(&result);
        match &result {
            Ok(extracted) => tracing::info!(
                stage = stage.as_str(),
                %file_name,
                model = %extracted.model,
                chars = extracted.text.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Extraction finished"
            ),
            Err(e) => tracing::warn!(
                stage = stage.as_str(),
                %file_name,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Extraction failed"
            ),
        }
        result
    }

    async fn run(&self, upload: UploadedImage, model: String) -> Result<ExtractionResult> {
        tracing::debug!(stage = Stage::Validating.as_str());
        let rules = self.rules.clone();
        let image = tokio::task::spawn_blocking(move || upload::validate(upload, &rules))
            .await
            .map_err(|e| AppError::Internal(format!("Validation task failed: {}", e)))??;

        tracing::debug!(stage = Stage::Encoding.as_str(), kind = image.kind().mime_type(), size = image.size());
        let request = ExtractionRequest {
            model,
            image_base64: base64::engine::general_purpose::STANDARD.encode(image.bytes()),
            system_prompt: SYSTEM_PROMPT.to_string(),
            prompt: USER_PROMPT.to_string(),
        };
        drop(image);

        tracing::debug!(stage = Stage::Calling.as_str(), model = %request.model);
        let reply = tokio::time::timeout(self.timeout, self.engine.extract(&request))
            .await
            .map_err(|_| {
                AppError::EngineTimeout(format!(
                    "Request to Ollama timed out after {} seconds. The image processing is taking too long.",
                    self.timeout.as_secs_f64()
                ))
            })??;

        tracing::debug!(endpoint = reply.endpoint.path(), "Engine replied");
        Ok(ExtractionResult {
            text: clean_extracted_text(&reply.text),
            model: request.model,
            usage: reply.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::types::{EngineError, TokenUsage};
    use crate::test_support::{MockEngine, MockReply};
    use crate::upload::{fixtures, BYTES_PER_MB};

    fn service(engine: Arc<MockEngine>, timeout: Duration) -> ExtractionService {
        ExtractionService::new(engine, ImageRules::default(), timeout)
    }

    fn png_upload() -> UploadedImage {
        UploadedImage {
            bytes: fixtures::png(),
            declared_mime: Some("image/png".to_string()),
            file_name: Some("page.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_success_cleans_text_and_reports_model() {
        let engine = Arc::new(MockEngine::replying("```\nHello world\n```"));
        let svc = service(engine.clone(), Duration::from_secs(5));

        let result = svc.extract(png_upload(), "llava:latest".to_string()).await.unwrap();

        assert_eq!(result.text, "Hello world");
        assert_eq!(result.model, "llava:latest");
        assert_eq!(
            result.usage,
            Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30
            })
        );
        assert_eq!(engine.extract_calls(), 1);

        let sent = engine.last_request().unwrap();
        assert_eq!(sent.model, "llava:latest");
        assert_eq!(sent.system_prompt, SYSTEM_PROMPT);
        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(sent.image_base64)
                .unwrap(),
            fixtures::png()
        );
    }

    #[tokio::test]
    async fn test_rejected_input_never_reaches_engine() {
        let engine = Arc::new(MockEngine::replying("unused"));
        let svc = service(engine.clone(), Duration::from_secs(5));

        let inputs = vec![
            b"This is not an image".to_vec(),
            fixtures::gif(),
            fixtures::corrupt_png(),
            vec![0u8; 11 * BYTES_PER_MB],
            Vec::new(),
        ];
        for bytes in inputs {
            let result = svc.extract(UploadedImage::new(bytes), "llava".to_string()).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
            assert_eq!(Stage::terminal(&result), Stage::Rejected);
        }
        assert_eq!(engine.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_engine_errors_map_to_taxonomy() {
        let cases = vec![
            (EngineError::ConnectionFailed("refused".into()), Stage::EngineUnavailable),
            (EngineError::Timeout, Stage::TimedOut),
            (EngineError::ModelNotFound("llava".into()), Stage::EngineError),
            (
                EngineError::Upstream {
                    status: 500,
                    body: "secret internals".into(),
                },
                Stage::EngineError,
            ),
        ];

        for (error, expected) in cases {
            let engine = Arc::new(MockEngine::new(MockReply::Fail(error)));
            let svc = service(engine.clone(), Duration::from_secs(5));
            let result = svc.extract(png_upload(), "llava".to_string()).await;
            assert_eq!(Stage::terminal(&result), expected);
            assert_eq!(engine.extract_calls(), 1, "no retries");
            if let Err(e) = result {
                assert!(!e.to_string().contains("secret internals"));
            }
        }
    }

    #[tokio::test]
    async fn test_stalled_engine_times_out_after_bound() {
        let engine = Arc::new(MockEngine::new(MockReply::Stall(Duration::from_secs(10))));
        let timeout = Duration::from_millis(200);
        let svc = service(engine, timeout);

        let started = Instant::now();
        let result = svc.extract(png_upload(), "llava".to_string()).await;

        assert!(matches!(result, Err(AppError::EngineTimeout(_))));
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_terminal_stages() {
        for stage in [
            Stage::Rejected,
            Stage::Succeeded,
            Stage::EngineUnavailable,
            Stage::TimedOut,
            Stage::EngineError,
        ] {
            assert!(stage.is_terminal());
        }
        for stage in [Stage::Received, Stage::Validating, Stage::Encoding, Stage::Calling] {
            assert!(!stage.is_terminal());
        }
    }
}
