//! End-to-end analysis pipeline shared by the three analysis routes.
//!
//! Fetch the image, assemble prompts, invoke the model pair, recover JSON
//! from the reply, reconcile the schema and stamp metadata. Route-specific
//! behavior lives entirely in the `RouteSpec` each handler passes in.

use anyhow::anyhow;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::AppError;
use crate::models::AnalyzeRequest;
use crate::services::image_fetcher::ImageFetcher;
use crate::services::invoker::{invoke_once, invoke_with_fallback, ModelPair};
use crate::services::prompt::{build_prompts, PromptTemplate, SamplingPolicy};
use crate::services::providers::VisionProvider;
use crate::services::recovery::{parse_recovered, parse_strict};
use crate::services::reconcile::{reconcile, stamp_metadata};

/// Default seconds a client should wait after a 429.
pub const RETRY_AFTER_SECS: u64 = 30;

const REQUERY_SYSTEM: &str =
    "Ты возвращаешь только валидный JSON. Никакого текста вне JSON-объекта.";
const REQUERY_SUFFIX: &str =
    "\n\nВерни ответ строго одним JSON-объектом, без пояснений и без markdown.";

/// Everything that distinguishes one analysis route from another.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub analysis_type: &'static str,
    pub template: PromptTemplate,
    pub required_fields: &'static [&'static str],
    /// Routes whose older clients sent zones as plain strings.
    pub allow_legacy_zones: bool,
    pub max_tokens: u32,
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub sampling: SamplingPolicy,
}

pub async fn run(
    fetcher: &ImageFetcher,
    provider: &dyn VisionProvider,
    models: &ModelPair,
    spec: &RouteSpec,
    request: &AnalyzeRequest,
) -> Result<Value, AppError> {
    let url = request
        .source_url()
        .ok_or_else(|| AppError::BadRequest(anyhow!("Image URL required")))?;

    let image = fetcher.fetch(url).await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "Image fetch failed");
        AppError::BadRequest(anyhow!(e))
    })?;

    let prompts = build_prompts(&spec.template, spec.analysis_type, request);
    tracing::info!(
        analysis_id = %prompts.analysis_id,
        analysis_type = spec.analysis_type,
        image_bytes = image.bytes.len(),
        "Starting analysis"
    );

    let reply = invoke_with_fallback(
        provider,
        models,
        &prompts,
        &image,
        spec.sampling.draw(spec.max_tokens),
        spec.primary_timeout,
        spec.fallback_timeout,
    )
    .await
    .map_err(|e| {
        if e.rate_limited {
            AppError::TooManyRequests(
                request.language.rate_limit_message().to_string(),
                Some(RETRY_AFTER_SECS),
            )
        } else {
            AppError::InternalError(anyhow!("AI analysis failed: {}", e.detail()))
        }
    })?;

    let mut parsed = match parse_recovered(&reply.text) {
        Ok(parsed) => parsed,
        Err(parse_error) => {
            tracing::warn!(
                analysis_id = %prompts.analysis_id,
                reason = %parse_error.reason,
                preview = %parse_error.raw_preview,
                "Unparseable model reply, issuing strict re-query"
            );
            requery_strict(provider, &reply.model_used, &prompts.user, &image, spec).await?
        }
    };

    reconcile(&mut parsed, spec.required_fields, spec.allow_legacy_zones)
        .map_err(|e| AppError::InternalError(anyhow!(e)))?;
    stamp_metadata(
        &mut parsed,
        &reply.model_used,
        &prompts.analysis_id,
        spec.analysis_type,
    );

    tracing::info!(
        analysis_id = %prompts.analysis_id,
        model_used = %reply.model_used,
        "Analysis complete"
    );

    Ok(Value::Object(parsed))
}

/// One extra near-deterministic call demanding bare JSON, parsed without
/// the repair passes. Runs only after a successful invocation produced
/// text the recovery parser could not salvage.
async fn requery_strict(
    provider: &dyn VisionProvider,
    model: &str,
    user_prompt: &str,
    image: &crate::services::providers::ImagePayload,
    spec: &RouteSpec,
) -> Result<Map<String, Value>, AppError> {
    let strict_user = format!("{user_prompt}{REQUERY_SUFFIX}");
    let text = invoke_once(
        provider,
        model,
        REQUERY_SYSTEM,
        &strict_user,
        image,
        SamplingPolicy::strict(spec.max_tokens),
        spec.fallback_timeout,
    )
    .await
    .map_err(|e| AppError::InternalError(anyhow!("Strict re-query failed: {e}")))?;

    parse_strict(&text).map_err(|e| {
        tracing::error!(reason = %e.reason, preview = %e.raw_preview, "Strict re-query still unparseable");
        AppError::InternalError(anyhow!("Failed to parse analysis response: {}", e.reason))
    })
}
