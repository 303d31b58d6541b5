//! Configuration management for the OCR server
//!
//! Values are read once at start-up. Only the current model may change
//! afterwards, and that lives in the model registry rather than here.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::upload::{ImageKind, ImageRules, BYTES_PER_MB, DEFAULT_MAX_UPLOAD_MB};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Unsupported MIME type in ALLOWED_IMAGE_MIME: {0}")]
    UnsupportedMime(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub upload: UploadConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    /// Model requested through the environment, if any
    pub model: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_upload_mb: usize,
    pub allowed_types: Vec<ImageKind>,
}

#[derive(Debug, Clone)]
pub struct ModelsConfig {
    /// File listing supported models, one per line
    pub models_file: PathBuf,
    /// Download a missing model when switching to it
    pub auto_pull: bool,
    pub pull_timeout: Duration,
}

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 600;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                allowed_origins: vec![
                    "http://localhost:8080".to_string(),
                    "http://localhost:3000".to_string(),
                ],
            },
            ollama: OllamaConfig {
                host: DEFAULT_OLLAMA_HOST.to_string(),
                model: None,
                request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            },
            upload: UploadConfig {
                max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
                allowed_types: ImageKind::ALL.to_vec(),
            },
            models: ModelsConfig {
                models_file: PathBuf::from("models.txt"),
                auto_pull: false,
                pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let allowed_types = match lookup("ALLOWED_IMAGE_MIME") {
            Some(raw) => parse_mime_list(&raw)?,
            None => defaults.upload.allowed_types,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.server.allowed_origins);

        Ok(Config {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or(defaults.server.host),
                port: parse_or("PORT", lookup("PORT"), defaults.server.port)?,
                allowed_origins,
            },
            ollama: OllamaConfig {
                host: lookup("OLLAMA_HOST")
                    .map(|host| host.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.ollama.host),
                model: lookup("OLLAMA_MODEL").filter(|m| !m.trim().is_empty()),
                request_timeout: Duration::from_millis(parse_or(
                    "REQUEST_TIMEOUT_MS",
                    lookup("REQUEST_TIMEOUT_MS"),
                    DEFAULT_REQUEST_TIMEOUT_MS,
                )?),
            },
            upload: UploadConfig {
                max_upload_mb: parse_upload_mb(
                    lookup("MAX_UPLOAD_MB"),
                    defaults.upload.max_upload_mb,
                )?,
                allowed_types,
            },
            models: ModelsConfig {
                models_file: lookup("MODELS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.models.models_file),
                auto_pull: parse_or("AUTO_PULL_MODELS", lookup("AUTO_PULL_MODELS"), false)?,
                pull_timeout: Duration::from_secs(parse_or(
                    "PULL_TIMEOUT_SECS",
                    lookup("PULL_TIMEOUT_SECS"),
                    DEFAULT_PULL_TIMEOUT_SECS,
                )?),
            },
        })
    }

    /// Upload rules derived from the upload settings
    pub fn image_rules(&self) -> ImageRules {
        ImageRules::new(self.upload.allowed_types.clone(), self.upload.max_upload_mb)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// The ceiling must fit in bytes along with the multipart body allowance
fn parse_upload_mb(raw: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let mb = parse_or("MAX_UPLOAD_MB", raw, default)?;
    mb.checked_mul(BYTES_PER_MB)
        .and_then(|bytes| bytes.checked_mul(2))
        .and_then(|bytes| bytes.checked_add(BYTES_PER_MB))
        .map(|_| mb)
        .ok_or(ConfigError::InvalidValue {
            name: "MAX_UPLOAD_MB",
            value: mb.to_string(),
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_mime_list(raw: &str) -> Result<Vec<ImageKind>, ConfigError> {
    let mut kinds = Vec::new();
    for mime in split_list(raw) {
        let kind = ImageKind::from_mime(&mime).ok_or(ConfigError::UnsupportedMime(mime))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}
