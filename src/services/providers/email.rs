//! Transactional e-mail providers.

use super::{EmailMessage, EmailProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    /// Sender in `Name <addr>` form.
    pub from: String,
}

pub struct ResendProvider {
    config: ResendConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    message: Option<String>,
}

impl ResendProvider {
    pub fn new(config: ResendConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Resend API key not configured".to_string(),
            ));
        }

        Ok(Self {
            config,
            client: Client::new(),
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), ProviderError> {
        let request = ResendRequest {
            from: &self.config.from,
            to: vec![&email.to],
            subject: &email.subject,
            html: &email.body_html,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ResendError>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Resend API error {}: {}",
                status, detail
            )));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Mock e-mail provider for tests and keyless dev runs.
pub struct MockEmailProvider {
    send_count: AtomicU64,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            send_count: AtomicU64::new(0),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), ProviderError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(to = %email.to, "Mock email provider: pretending to send");
        Ok(())
    }
}
