//! Model invocation with a timeout race and a single fallback attempt.
//!
//! The primary call is raced against the route's deadline; on error or
//! timeout exactly one secondary call goes to the fallback model with the
//! simplified system prompt and a shorter budget. Two attempts total, never
//! more. The race only stops waiting; it does not abort the remote call.

use crate::services::prompt::{BuiltPrompts, SamplingPolicy};
use crate::services::providers::{ImagePayload, ProviderError, SamplingParams, VisionProvider};
use std::time::Duration;
use thiserror::Error;

/// Primary/fallback model identifiers for one deployment.
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub primary: String,
    pub fallback: String,
}

/// Raw text reply plus the model that produced it.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub model_used: String,
}

/// Both attempts failed; carries attempt-level detail for diagnosis.
#[derive(Debug, Error)]
#[error("AI analysis failed: {}", self.detail())]
pub struct ModelError {
    pub primary_model: String,
    pub primary_detail: String,
    pub fallback_model: String,
    pub fallback_detail: String,
    pub rate_limited: bool,
}

impl ModelError {
    pub fn detail(&self) -> String {
        format!(
            "{}: {}, {}: {}",
            self.primary_model, self.primary_detail, self.fallback_model, self.fallback_detail
        )
    }
}

/// One attempt raced against a deadline.
async fn attempt(
    provider: &dyn VisionProvider,
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    image: &ImagePayload,
    params: &SamplingParams,
    deadline: Duration,
) -> Result<String, ProviderError> {
    match tokio::time::timeout(
        deadline,
        provider.generate(model, system_prompt, user_prompt, image, params),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(deadline.as_secs())),
    }
}

pub async fn invoke_with_fallback(
    provider: &dyn VisionProvider,
    models: &ModelPair,
    prompts: &BuiltPrompts,
    image: &ImagePayload,
    primary_params: SamplingParams,
    primary_timeout: Duration,
    fallback_timeout: Duration,
) -> Result<ModelReply, ModelError> {
    let primary_error = match attempt(
        provider,
        &models.primary,
        &prompts.system,
        &prompts.user,
        image,
        &primary_params,
        primary_timeout,
    )
    .await
    {
        Ok(text) => {
            return Ok(ModelReply {
                text,
                model_used: models.primary.clone(),
            })
        }
        Err(e) => e,
    };

    tracing::warn!(
        primary_model = %models.primary,
        error = %primary_error,
        "Primary model failed, trying fallback"
    );

    let fallback_params = SamplingPolicy::fallback(primary_params.max_tokens);
    match attempt(
        provider,
        &models.fallback,
        &prompts.fallback_system,
        &prompts.user,
        image,
        &fallback_params,
        fallback_timeout,
    )
    .await
    {
        Ok(text) => Ok(ModelReply {
            text,
            model_used: models.fallback.clone(),
        }),
        Err(fallback_error) => {
            tracing::error!(
                primary_error = %primary_error,
                fallback_error = %fallback_error,
                "Both models failed"
            );
            Err(ModelError {
                rate_limited: primary_error.is_rate_limited() || fallback_error.is_rate_limited(),
                primary_model: models.primary.clone(),
                primary_detail: primary_error.to_string(),
                fallback_model: models.fallback.clone(),
                fallback_detail: fallback_error.to_string(),
            })
        }
    }
}

/// Single bounded attempt, used for the strict JSON re-query after an
/// unparseable reply. No fallback here.
pub async fn invoke_once(
    provider: &dyn VisionProvider,
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    image: &ImagePayload,
    params: SamplingParams,
    deadline: Duration,
) -> Result<String, ProviderError> {
    attempt(provider, model, system_prompt, user_prompt, image, &params, deadline).await
}
