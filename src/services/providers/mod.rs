//! External provider abstractions.
//!
//! Trait-based so handlers and the pipeline can run against mocks in tests
//! instead of process-wide clients.

pub mod anthropic;
pub mod email;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Rate-limit-shaped failures map to 429 instead of 500 at the HTTP layer.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited => true,
            ProviderError::ApiError(msg) | ProviderError::NetworkError(msg) => {
                let lowered = msg.to_ascii_lowercase();
                lowered.contains("rate_limit")
                    || lowered.contains("rate limit")
                    || lowered.contains("overloaded")
                    || lowered.contains("quota")
            }
            _ => false,
        }
    }
}

/// Supported image media types for model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            _ => None,
        }
    }
}

/// Fetched image bytes plus the resolved media type.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

/// Per-call sampling parameters, drawn from the route's `SamplingPolicy`.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: u32,
}

/// Trait for vision-capable text generation providers (e.g. Anthropic).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send one prompt + image to the given model and return the raw text reply.
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        image: &ImagePayload,
        params: &SamplingParams,
    ) -> Result<String, ProviderError>;
}

/// Outgoing report e-mail.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_html: String,
}

/// Trait for transactional e-mail providers (e.g. Resend).
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), ProviderError>;
}

pub use anthropic::AnthropicProvider;
pub use email::{MockEmailProvider, ResendProvider};
pub use mock::MockVisionProvider;
