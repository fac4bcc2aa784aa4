//! Multipart image upload to the media host.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::error::AppError;
use crate::models::UploadResponse;
use crate::services::image_fetcher::MAX_IMAGE_BYTES;
use crate::services::providers::MediaType;
use crate::startup::AppState;

#[tracing::instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    if !state.media.is_configured() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "media host credentials missing"
        )));
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to parse uploaded file: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("unknown").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to parse uploaded file: {e}")))?;
        file = Some((content_type, bytes.to_vec()));
        break;
    }

    let (content_type, bytes) = file
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No image file found in upload")))?;

    if MediaType::from_mime(&content_type).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid file type: {content_type}. Only JPG, PNG, WebP allowed"
        )));
    }

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File too large: {}MB. Max 10MB allowed",
            bytes.len() / 1024 / 1024
        )));
    }

    tracing::info!(content_type = %content_type, size = bytes.len(), "Uploading image");

    let hosted = state
        .media
        .upload(&bytes, &content_type)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Upload failed: {e}")))?;

    tracing::info!(public_id = %hosted.public_id, "Upload complete");

    Ok(Json(UploadResponse {
        success: true,
        url: hosted.url,
        analysis_url: hosted.analysis_url,
        original_url: hosted.original_url,
        public_id: hosted.public_id,
        unique_id: hosted.unique_id,
    }))
}
