//! Model Module
//!
//! Supported-model list, the process-wide current model, and management
//! operations against the engine (listing, switching, pulling).

mod manager;
mod registry;

pub use manager::{EngineStatus, ModelCatalog, ModelManager};
pub use registry::{
    is_vision_model, load_supported_models, parse_models_list, ModelRegistry, RegistryError,
    DEFAULT_MODELS, VISION_MODEL_KEYWORDS,
};
