//! Upload Module
//!
//! Server-side validation of uploaded images. Uploads live in memory for the
//! duration of one request and are never written to disk.

mod types;
mod validator;

pub use types::{
    ImageKind, ImageRules, UploadedImage, ValidatedImage, ValidationError, BYTES_PER_MB,
    DEFAULT_MAX_UPLOAD_MB,
};
pub use validator::{sniff, validate};

#[cfg(test)]
pub(crate) use validator::fixtures;
