//! Shared test fixtures: an app router over scripted mock providers and a
//! tiny HTTP server handing out a fixed JPEG.

use analyzer_service::config::{
    AnthropicConfig, AppConfig, CloudinaryConfig, CommonConfig, ResendConfig,
};
use analyzer_service::services::providers::{MockEmailProvider, MockVisionProvider, ProviderError};
use analyzer_service::services::{CloudinaryClient, ImageFetcher, MockMediaHost, ModelPair};
use analyzer_service::startup::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const PRIMARY_MODEL: &str = "claude-sonnet-4-20250514";
pub const FALLBACK_MODEL: &str = "claude-3-5-sonnet-20241022";

pub struct TestApp {
    pub router: Router,
    pub vision: Arc<MockVisionProvider>,
    pub email: Arc<MockEmailProvider>,
    pub media: Arc<MockMediaHost>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        common: CommonConfig { port: 0 },
        anthropic: AnthropicConfig {
            api_key: String::new(),
            primary_model: PRIMARY_MODEL.to_string(),
            fallback_model: FALLBACK_MODEL.to_string(),
        },
        cloudinary: CloudinaryConfig {
            url: None,
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
        },
        resend: ResendConfig {
            api_key: String::new(),
            from: "Health Analyzer <noreply@test>".to_string(),
        },
    }
}

pub fn spawn_app_with_script(script: Vec<Result<String, ProviderError>>) -> TestApp {
    let vision = Arc::new(MockVisionProvider::with_script(script));
    let email = Arc::new(MockEmailProvider::new());
    let media = Arc::new(MockMediaHost::new());

    let state = AppState {
        config: test_config(),
        vision: vision.clone(),
        email: email.clone(),
        media: media.clone(),
        models: ModelPair {
            primary: PRIMARY_MODEL.to_string(),
            fallback: FALLBACK_MODEL.to_string(),
        },
        fetcher: ImageFetcher::new(),
    };

    TestApp {
        router: router(state),
        vision,
        email,
        media,
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with_script(Vec::new())
}

/// Router whose media host has no credentials, as on a misconfigured deploy.
pub fn spawn_app_without_media_credentials() -> Router {
    let config = test_config();
    let media = CloudinaryClient::new(&config.cloudinary).expect("cloudinary client");

    let state = AppState {
        config,
        vision: Arc::new(MockVisionProvider::new()),
        email: Arc::new(MockEmailProvider::new()),
        media: Arc::new(media),
        models: ModelPair {
            primary: PRIMARY_MODEL.to_string(),
            fallback: FALLBACK_MODEL.to_string(),
        },
        fetcher: ImageFetcher::new(),
    };

    router(state)
}

/// Serves a fixed JPEG at `/image.jpg` on a random local port and returns
/// the base URL.
pub async fn spawn_image_server() -> String {
    let app = Router::new().route(
        "/image.jpg",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "image/jpeg")],
                &[0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10][..],
            )
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind image server");
    let addr = listener.local_addr().expect("image server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("image server failed");
    });
    format!("http://{addr}")
}

/// Serves a response past the 10 MB fetch ceiling.
pub async fn spawn_oversize_image_server() -> String {
    let app = Router::new().route(
        "/image.jpg",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "image/jpeg")],
                vec![0u8; 11 * 1024 * 1024],
            )
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind image server");
    let addr = listener.local_addr().expect("image server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("image server failed");
    });
    format!("http://{addr}")
}

pub fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}
