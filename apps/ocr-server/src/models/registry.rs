//! Supported models and the current-model cell

use std::path::Path;

use parking_lot::RwLock;

/// Used when no models file is present
pub const DEFAULT_MODELS: &[&str] = &["moondream:1.8b", "llava:latest", "llama3.2-vision:latest"];

/// Name fragments that mark a model as image-capable
pub const VISION_MODEL_KEYWORDS: &[&str] = &[
    "llava",
    "moondream",
    "vision",
    "bakllava",
    "qwen2-vl",
    "minicpm-v",
];

/// Parse a models list: one name per line, `#` comments and blanks skipped
pub fn parse_models_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the supported model list, falling back to [`DEFAULT_MODELS`]
pub fn load_supported_models(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let models = parse_models_list(&contents);
            if models.is_empty() {
                tracing::warn!(path = %path.display(), "Models file is empty, using defaults");
                default_models()
            } else {
                models
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => default_models(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read models file, using defaults");
            default_models()
        }
    }
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

pub fn is_vision_model(name: &str) -> bool {
    let name = name.to_lowercase();
    VISION_MODEL_KEYWORDS.iter().any(|keyword| name.contains(keyword))
}

/// Model switch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Model '{model}' is not supported. Supported models: {supported}")]
    Unsupported { model: String, supported: String },
}

/// Supported model list plus the process-wide current model.
///
/// The current model has a single writer (model switches) and many readers
/// (every extraction). Readers take a snapshot with [`ModelRegistry::current`]
/// and use it for the whole request.
pub struct ModelRegistry {
    supported: Vec<String>,
    current: RwLock<String>,
}

impl ModelRegistry {
    /// Create a registry. The initial model is `initial` when given,
    /// otherwise the first supported model.
    pub fn new(supported: Vec<String>, initial: Option<String>) -> Self {
        let supported = if supported.is_empty() {
            default_models()
        } else {
            supported
        };
        let current = initial.unwrap_or_else(|| supported[0].clone());

        if !supported.contains(&current) {
            tracing::warn!(model = %current, "Configured model is not in the supported list");
        }

        Self {
            supported,
            current: RwLock::new(current),
        }
    }

    /// Snapshot of the current model
    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn is_supported(&self, model: &str) -> bool {
        self.supported.iter().any(|m| m == model)
    }

    /// Check a switch target without mutating anything
    pub fn check(&self, model: &str) -> Result<(), RegistryError> {
        if self.is_supported(model) {
            Ok(())
        } else {
            Err(RegistryError::Unsupported {
                model: model.to_string(),
                supported: self.supported.join(", "),
            })
        }
    }

    /// Switch the current model. Returns the previous model.
    pub fn set_current(&self, model: &str) -> Result<String, RegistryError> {
        self.check(model)?;
        let mut current = self.current.write();
        Ok(std::mem::replace(&mut *current, model.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            vec!["moondream:1.8b".to_string(), "llava:latest".to_string()],
            None,
        )
    }

    #[test]
    fn test_parse_models_list() {
        let contents = "# Vision models\nmoondream:1.8b\n\n  llava:latest  \n# llama3.2-vision:latest\n";
        assert_eq!(parse_models_list(contents), vec!["moondream:1.8b", "llava:latest"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# supported").unwrap();
        writeln!(file, "qwen2-vl:7b").unwrap();

        assert_eq!(load_supported_models(file.path()), vec!["qwen2-vl:7b"]);
    }

    #[test]
    fn test_missing_or_empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_supported_models(&dir.path().join("models.txt")),
            DEFAULT_MODELS.to_vec()
        );

        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(load_supported_models(file.path()), DEFAULT_MODELS.to_vec());
    }

    #[test]
    fn test_initial_model() {
        assert_eq!(registry().current(), "moondream:1.8b");

        let configured = ModelRegistry::new(vec!["a".into()], Some("llava:latest".into()));
        assert_eq!(configured.current(), "llava:latest");
    }

    #[test]
    fn test_switch_supported() {
        let registry = registry();
        let previous = registry.set_current("llava:latest").unwrap();
        assert_eq!(previous, "moondream:1.8b");
        assert_eq!(registry.current(), "llava:latest");
    }

    #[test]
    fn test_switch_unsupported_leaves_state() {
        let registry = registry();
        let err = registry.set_current("gpt-4o").unwrap_err();
        assert!(matches!(err, RegistryError::Unsupported { ref model, .. } if model == "gpt-4o"));
        assert_eq!(registry.current(), "moondream:1.8b");
    }

    #[test]
    fn test_snapshot_unaffected_by_later_switch() {
        let registry = registry();
        let snapshot = registry.current();
        registry.set_current("llava:latest").unwrap();
        assert_eq!(snapshot, "moondream:1.8b");
    }

    #[test]
    fn test_is_vision_model() {
        assert!(is_vision_model("llava:13b"));
        assert!(is_vision_model("llama3.2-Vision:latest"));
        assert!(is_vision_model("minicpm-v:8b"));
        assert!(!is_vision_model("llama3:8b"));
    }
}
