//! Upload types
//!
//! Request-scoped image data and the rule set both the browser and the
//! server validate against.

use serde::Serialize;

// ============================================================================
// Constants
// ============================================================================

/// Default upload ceiling in megabytes
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Bytes per megabyte as used for the upload ceiling
pub const BYTES_PER_MB: usize = 1024 * 1024;

// ============================================================================
// Image Kinds
// ============================================================================

/// Image types accepted for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    WebP,
}

impl ImageKind {
    pub const ALL: [ImageKind; 3] = [ImageKind::Png, ImageKind::Jpeg, ImageKind::WebP];

    /// Canonical MIME type
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parse a MIME type from configuration or a client header
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub(crate) fn from_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    pub(crate) fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::WebP => image::ImageFormat::WebP,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Upload rule set: allow-listed types and the size ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRules {
    pub allowed: Vec<ImageKind>,
    pub max_bytes: usize,
}

impl ImageRules {
    pub fn new(allowed: Vec<ImageKind>, max_upload_mb: usize) -> Self {
        Self {
            allowed,
            max_bytes: max_upload_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    pub fn allows(&self, kind: ImageKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn max_mb(&self) -> usize {
        self.max_bytes / BYTES_PER_MB
    }

    pub fn allowed_mime_types(&self) -> Vec<&'static str> {
        self.allowed.iter().map(|kind| kind.mime_type()).collect()
    }
}

impl Default for ImageRules {
    fn default() -> Self {
        Self::new(ImageKind::ALL.to_vec(), DEFAULT_MAX_UPLOAD_MB)
    }
}

// ============================================================================
// Images
// ============================================================================

/// Image as received from the client. Nothing here is trusted.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    /// Content type the client claimed
    pub declared_mime: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            declared_mime: None,
            file_name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("upload")
    }
}

/// Image that passed size, sniffing and decode checks
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    bytes: Vec<u8>,
    kind: ImageKind,
}

impl ValidatedImage {
    pub(crate) fn new(bytes: Vec<u8>, kind: ImageKind) -> Self {
        Self { bytes, kind }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Type detected from the content
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons an upload is rejected. Always client-caused.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No file provided")]
    MissingFile,

    #[error("File '{0}' is empty")]
    Empty(String),

    #[error("File '{name}' is too large ({:.2}MB). Maximum size: {}MB", megabytes(.size), .max / BYTES_PER_MB)]
    TooLarge { name: String, size: usize, max: usize },

    #[error("Upload is too large. Maximum size: {}MB", .max / BYTES_PER_MB)]
    BodyTooLarge { max: usize },

    #[error("File type '{detected}' not allowed. Supported types: {allowed}")]
    UnsupportedType { detected: String, allowed: String },

    #[error("File '{0}' is not a valid image or is corrupted")]
    Corrupt(String),

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

fn megabytes(bytes: &usize) -> f64 {
    *bytes as f64 / BYTES_PER_MB as f64
}

impl ValidationError {
    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::Empty(_) => "empty",
            Self::TooLarge { .. } | Self::BodyTooLarge { .. } => "too_large",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::Corrupt(_) => "corrupt",
            Self::Malformed(_) => "malformed",
        }
    }
}
