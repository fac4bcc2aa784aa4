//! Anthropic messages API provider.
//!
//! Sends a base64-encoded image plus text prompt to the messages endpoint
//! and extracts the first text block of the reply.

use super::{ImagePayload, ProviderError, SamplingParams, VisionProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
}

pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Anthropic API key not configured".to_string(),
            ));
        }

        // Per-call deadlines are enforced by the invoker's timeout race; this
        // is only a transport-level ceiling.
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        image: &ImagePayload,
        params: &SamplingParams,
    ) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
            top_p: params.top_p,
            system: Some(system_prompt.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Text {
                        text: user_prompt.to_string(),
                    },
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.media_type.mime().to_string(),
                            data: general_purpose::STANDARD.encode(&image.bytes),
                        },
                    },
                ],
            }],
        };

        tracing::debug!(
            model = %model,
            prompt_len = user_prompt.len(),
            image_bytes = image.bytes.len(),
            temperature = params.temperature,
            "Sending request to Anthropic API"
        );

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(120)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Anthropic API error {}: {}",
                status,
                extract_error_message(&error_text)
            )));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = api_response
            .content
            .iter()
            .find_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.clone()),
                ResponseBlock::Other => None,
            })
            .ok_or_else(|| {
                ProviderError::ApiError("Invalid response structure from model".to_string())
            })?;

        Ok(text)
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

// ============================================================================
// Anthropic API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}
