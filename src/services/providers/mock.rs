//! Mock vision provider for tests and keyless dev runs.

use super::{ImagePayload, ProviderError, SamplingParams, VisionProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scripted provider: pops one reply per call, in order. When the script is
/// exhausted it keeps returning `default_reply`.
pub struct MockVisionProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    default_reply: String,
    call_count: AtomicU64,
}

impl MockVisionProvider {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default_reply: r#"{"detailed_analysis":"Mock analysis","zone_analysis":{"anterior":"ok","middle":"ok","posterior":"ok","lateral":"ok"},"health_interpretation":"Mock interpretation"}"#
                .to_string(),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockVisionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn generate(
        &self,
        model: &str,
        _system_prompt: &str,
        _user_prompt: &str,
        _image: &ImagePayload,
        _params: &SamplingParams,
    ) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(model = %model, "Mock vision provider invoked");

        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match next {
            Some(reply) => reply,
            None => Ok(self.default_reply.clone()),
        }
    }
}
