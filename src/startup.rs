//! Application startup and lifecycle management.

use crate::config::AppConfig;
use crate::handlers;
use crate::services::providers::anthropic::AnthropicConfig as AnthropicProviderConfig;
use crate::services::providers::email::ResendConfig as ResendProviderConfig;
use crate::services::providers::{
    AnthropicProvider, EmailProvider, MockEmailProvider, MockVisionProvider, ResendProvider,
    VisionProvider,
};
use crate::services::image_fetcher::MAX_IMAGE_BYTES;
use crate::services::{CloudinaryClient, ImageFetcher, MediaHost, ModelPair};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub vision: Arc<dyn VisionProvider>,
    pub email: Arc<dyn EmailProvider>,
    pub media: Arc<dyn MediaHost>,
    pub models: ModelPair,
    pub fetcher: ImageFetcher,
}

/// Build the router with CORS and anti-cache headers applied to every
/// response. Clients re-take photos and must never see a cached analysis.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::CACHE_CONTROL]);

    Router::new()
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/analyze-detailed", post(handlers::analyze_detailed))
        .route(
            "/api/analyze-comprehensive",
            post(handlers::analyze_comprehensive),
        )
        .route(
            "/api/upload",
            // Default 2 MB body cap rejects legal images before the
            // handler's own 10 MB check; leave headroom for multipart
            // framing.
            post(handlers::upload).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 2 * 1024 * 1024)),
        )
        .route("/api/send-results", post(handlers::send_results))
        .route("/health", get(handlers::health_check))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration. Providers with
    /// missing credentials fall back to mocks so local runs work without
    /// real accounts.
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let vision: Arc<dyn VisionProvider> = if config.anthropic.api_key.is_empty() {
            tracing::warn!("ANTHROPIC_API_KEY missing, using mock vision provider");
            Arc::new(MockVisionProvider::new())
        } else {
            let provider = AnthropicProvider::new(AnthropicProviderConfig {
                api_key: config.anthropic.api_key.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!(
                primary_model = %config.anthropic.primary_model,
                fallback_model = %config.anthropic.fallback_model,
                "Initialized Anthropic vision provider"
            );
            Arc::new(provider)
        };

        let email: Arc<dyn EmailProvider> = if config.resend.api_key.is_empty() {
            tracing::warn!("RESEND_API_KEY missing, using mock email provider");
            Arc::new(MockEmailProvider::new())
        } else {
            let provider = ResendProvider::new(ResendProviderConfig {
                api_key: config.resend.api_key.clone(),
                from: config.resend.from.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!(from = %config.resend.from, "Initialized Resend email provider");
            Arc::new(provider)
        };

        let media: Arc<dyn MediaHost> = {
            let client = CloudinaryClient::new(&config.cloudinary)
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            if !client.is_configured() {
                tracing::warn!("Cloudinary credentials missing, uploads will fail");
            }
            Arc::new(client)
        };

        let models = ModelPair {
            primary: config.anthropic.primary_model.clone(),
            fallback: config.anthropic.fallback_model.clone(),
        };

        let state = AppState {
            config: config.clone(),
            vision,
            email,
            media,
            models,
            fetcher: ImageFetcher::new(),
        };

        // Port 0 binds a random port for tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Analyzer service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until it is stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);
        axum::serve(self.listener, app).await
    }
}
