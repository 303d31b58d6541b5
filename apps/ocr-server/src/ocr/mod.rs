//! OCR Module
//!
//! Text extraction through a local Ollama vision model.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ocr_server::ocr::{ExtractionService, OllamaClient};
//! use ocr_server::upload::{ImageRules, UploadedImage};
//!
//! let engine = Arc::new(OllamaClient::new("http://localhost:11434", timeout, pull_timeout)?);
//! let service = ExtractionService::new(engine, ImageRules::default(), timeout);
//!
//! let result = service
//!     .extract(UploadedImage::new(bytes), "llava:latest".to_string())
//!     .await?;
//! println!("{}", result.text);
//! ```

mod client;
mod normalize;
mod service;
mod types;

pub use client::{InferenceEngine, OllamaClient};
pub use normalize::clean_extracted_text;
pub use service::{ExtractionService, Stage, SYSTEM_PROMPT, USER_PROMPT};
pub use types::{
    Attempt, Endpoint, EngineError, EngineReply, ExtractionRequest, ExtractionResult, PullOutcome,
    TokenUsage,
};
