//! Image validation
//!
//! Checks run in a fixed order so that cheap rejections never pay for the
//! expensive ones: emptiness, size ceiling, magic-byte sniffing, then a full
//! decode with the sniffed format.

use super::types::{ImageKind, ImageRules, UploadedImage, ValidatedImage, ValidationError};

/// Sniff the image type from content. Returns the detected MIME type string
/// alongside the kind when it is one we support.
pub fn sniff(bytes: &[u8]) -> (Option<ImageKind>, String) {
    match image::guess_format(bytes) {
        Ok(format) => (
            ImageKind::from_format(format),
            format.to_mime_type().to_string(),
        ),
        Err(_) => (None, "application/octet-stream".to_string()),
    }
}

/// Validate an upload against the rule set.
///
/// The declared content type is only compared for logging; the decision is
/// made from the bytes alone.
pub fn validate(upload: UploadedImage, rules: &ImageRules) -> Result<ValidatedImage, ValidationError> {
    let name = upload.display_name().to_string();
    let bytes = upload.bytes;

    if bytes.is_empty() {
        return Err(ValidationError::Empty(name));
    }

    if bytes.len() > rules.max_bytes {
        return Err(ValidationError::TooLarge {
            name,
            size: bytes.len(),
            max: rules.max_bytes,
        });
    }

    let (kind, detected) = sniff(&bytes);
    let kind = match kind {
        Some(kind) if rules.allows(kind) => kind,
        _ => {
            return Err(ValidationError::UnsupportedType {
                detected,
                allowed: rules.allowed_mime_types().join(", "),
            })
        }
    };

    if let Some(declared) = upload.declared_mime.as_deref() {
        if ImageKind::from_mime(declared) != Some(kind) {
            tracing::debug!(
                file_name = %name,
                declared,
                detected = kind.mime_type(),
                "Declared content type does not match content"
            );
        }
    }

    if let Err(e) = image::load_from_memory_with_format(&bytes, kind.image_format()) {
        tracing::debug!(file_name = %name, error = %e, "Image failed to decode");
        return Err(ValidationError::Corrupt(name));
    }

    Ok(ValidatedImage::new(bytes, kind))
}
