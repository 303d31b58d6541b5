//! Text extraction route
//!
//! `POST /api/extract-text` takes a multipart form with a `file` field.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::ocr::ExtractionResult;
use crate::state::AppState;
use crate::upload::{UploadedImage, ValidationError};

/// Form field carrying the image
pub const FILE_FIELD: &str = "file";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/extract-text", post(extract_text))
}

async fn extract_text(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionResult>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("extract_text", %request_id);
    handle_extraction(state, multipart).instrument(span).await
}

async fn handle_extraction(
    state: AppState,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionResult>> {
    let multipart = multipart.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let upload = read_upload(multipart, state.extractor().rules().max_bytes).await?;

    // Snapshot once; a concurrent switch does not affect this request
    let model = state.models().current();
    tracing::info!(
        file_name = upload.display_name(),
        size = upload.bytes.len(),
        %model,
        "Processing text extraction"
    );

    let result = state.extractor().extract(upload, model).await?;
    Ok(Json(result))
}

/// Pull the image out of the form. Other fields are ignored.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> std::result::Result<UploadedImage, ValidationError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, max_bytes))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let declared_mime = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;

        return Ok(UploadedImage {
            bytes: bytes.to_vec(),
            declared_mime,
            file_name,
        });
    }

    Err(ValidationError::MissingFile)
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_bytes: usize) -> ValidationError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::BodyTooLarge { max: max_bytes }
    } else {
        ValidationError::Malformed(e.body_text())
    }
}
