//! Image retrieval with a hard timeout and size ceiling.
//!
//! The fetch happens before any model call; a failure here is always a
//! client-facing 400 and no model invocation takes place.

use crate::services::providers::{ImagePayload, MediaType};
use reqwest::Client;
use std::time::Duration;

/// Response size ceiling, matching the upload limit.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);
const USER_AGENT: &str = "Health-Analyzer-Pro/1.0";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch image from provided URL")]
    Network(#[source] reqwest::Error),

    #[error("Image exceeds {MAX_IMAGE_BYTES} byte limit")]
    TooLarge,
}

#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    pub fn new() -> Self {
        // Client construction only fails on TLS backend misconfiguration;
        // fall back to the default client in that case.
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Retrieve the image at `url`, resolving its media type from the
    /// response headers and falling back to the URL suffix.
    pub async fn fetch(&self, url: &str) -> Result<ImagePayload, FetchError> {
        let parsed: reqwest::Url = url
            .parse()
            .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(FetchError::Network)?;

        if let Some(len) = response.content_length() {
            if len as usize > MAX_IMAGE_BYTES {
                return Err(FetchError::TooLarge);
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response.bytes().await.map_err(FetchError::Network)?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(FetchError::TooLarge);
        }

        let media_type = resolve_media_type(content_type.as_deref(), url);

        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            media_type = media_type.mime(),
            "Image fetch completed"
        );

        Ok(ImagePayload {
            bytes: bytes.to_vec(),
            media_type,
        })
    }
}

impl Default for ImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Content-Type header first (substring match), then the URL suffix,
/// defaulting to JPEG.
pub fn resolve_media_type(content_type: Option<&str>, url: &str) -> MediaType {
    if let Some(header) = content_type {
        if header.contains("png") {
            return MediaType::Png;
        }
        if header.contains("webp") {
            return MediaType::Webp;
        }
        return MediaType::Jpeg;
    }

    if url.contains(".png") {
        MediaType::Png
    } else if url.contains(".webp") {
        MediaType::Webp
    } else {
        MediaType::Jpeg
    }
}
