use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_code: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            retry_after: Option<u64>,
        }

        let (status, error_message, details, error_code, retry_after) = match self {
            AppError::ValidationError(err) => (
                StatusCode::BAD_REQUEST,
                "Validation error".to_string(),
                Some(err.to_string()),
                None,
                None,
            ),
            AppError::BadRequest(err) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None, None, None)
            }
            AppError::TooManyRequests(msg, retry) => (
                StatusCode::TOO_MANY_REQUESTS,
                msg,
                None,
                Some("RATE_LIMIT_EXCEEDED"),
                retry.or(Some(crate::services::pipeline::RETRY_AFTER_SECS)),
            ),
            AppError::InternalError(err) => {
                let mut chain = err.chain();
                let top = chain
                    .next()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Internal server error".to_string());
                let rest: Vec<String> = chain.map(|e| e.to_string()).collect();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    top,
                    if rest.is_empty() {
                        None
                    } else {
                        Some(rest.join(": "))
                    },
                    None,
                    None,
                )
            }
            AppError::EmailError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send email".to_string(),
                Some(msg),
                None,
                None,
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
                Some(err.to_string()),
                None,
                None,
            ),
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
                error_code,
                retry_after,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
