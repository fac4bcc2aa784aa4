//! Prompt assembly.
//!
//! Static per-route templates combined with request context (prior analysis
//! text, output language) and per-call uniqueness tokens. The tokens are a
//! functional requirement: provider-side caching keyed on prompt equality
//! must never return a memoized answer for a repeated-looking request, so
//! every call embeds a fresh random id and timestamp in both prompts.

use crate::models::AnalyzeRequest;
use crate::services::providers::SamplingParams;
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// Named sampling ranges instead of inline magic numbers, so tests can pin
/// deterministic values by constructing `SamplingParams` directly.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy {
    pub temperature_range: (f32, f32),
    pub top_p_range: (f32, f32),
}

impl SamplingPolicy {
    pub fn draw(&self, max_tokens: u32) -> SamplingParams {
        let mut rng = rand::thread_rng();
        SamplingParams {
            temperature: rng.gen_range(self.temperature_range.0..=self.temperature_range.1),
            top_p: Some(rng.gen_range(self.top_p_range.0..=self.top_p_range.1)),
            max_tokens,
        }
    }

    /// Fixed low-variance parameters for the fallback model.
    pub fn fallback(max_tokens: u32) -> SamplingParams {
        SamplingParams {
            temperature: 0.3,
            top_p: None,
            max_tokens,
        }
    }

    /// Near-deterministic parameters for the strict JSON re-query.
    pub fn strict(max_tokens: u32) -> SamplingParams {
        SamplingParams {
            temperature: 0.1,
            top_p: None,
            max_tokens,
        }
    }
}

/// Static text for one analysis route.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub system: &'static str,
    /// Shorter instruction used with the fallback model.
    pub fallback_system: &'static str,
    pub user_task: &'static str,
}

/// Fully assembled prompts plus the generated analysis id that doubles as
/// the cache-defeat token.
#[derive(Debug, Clone)]
pub struct BuiltPrompts {
    pub system: String,
    pub fallback_system: String,
    pub user: String,
    pub analysis_id: String,
}

pub fn build_prompts(
    template: &PromptTemplate,
    analysis_type: &str,
    request: &AnalyzeRequest,
) -> BuiltPrompts {
    let millis = Utc::now().timestamp_millis();
    let analysis_id = format!("{}_{}_{}", analysis_type, millis, short_token());
    let session_id = format!("session_{}_{}", millis, short_token());
    let request_id = format!("req_{}_{}", millis, short_token());

    let directive = request.language.directive();

    let system = format!(
        "{}\n{}\nСЕССИЯ: {}\nЗАПРОС: {}",
        template.system, directive, session_id, request_id
    );
    let fallback_system = format!(
        "{}\n{}\nСЕССИЯ: {}",
        template.fallback_system, directive, session_id
    );

    let mut user = format!("Образец {}\n{}", analysis_id, template.user_task);
    if let Some(context) = request
        .detailed_analysis
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        user.push_str("\n\nДетальный морфологический анализ:\n");
        user.push_str(context);
    }

    BuiltPrompts {
        system,
        fallback_system,
        user,
        analysis_id,
    }
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
