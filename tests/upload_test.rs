mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::util::ServiceExt;

use common::{body_json, spawn_app, spawn_app_without_media_credentials};

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn multipart_request(field_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"photo\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_returns_hosted_urls() {
    let app = spawn_app();

    let response = app
        .router
        .oneshot(multipart_request("image", "image/jpeg", &[0xFF, 0xD8, 0xFF]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["url"].as_str().unwrap().contains("?v="));
    assert!(body["analysisUrl"].as_str().unwrap().contains("e_improve"));
    assert!(body["publicId"].as_str().unwrap().starts_with("health-analyzer/"));
    assert_eq!(app.media.upload_count(), 1);
}

#[tokio::test]
async fn five_megabyte_image_clears_the_body_limit() {
    let app = spawn_app();

    let mut data = vec![0xFF, 0xD8, 0xFF];
    data.resize(5 * 1024 * 1024, 0);
    let response = app
        .router
        .oneshot(multipart_request("image", "image/jpeg", &data))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(app.media.upload_count(), 1);
}

#[tokio::test]
async fn oversize_image_is_rejected_with_size_message() {
    let app = spawn_app();

    let data = vec![0u8; 11 * 1024 * 1024];
    let response = app
        .router
        .oneshot(multipart_request("image", "image/jpeg", &data))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "File too large: 11MB. Max 10MB allowed");
    assert_eq!(app.media.upload_count(), 0);
}

#[tokio::test]
async fn disallowed_file_type_is_rejected() {
    let app = spawn_app();

    let response = app
        .router
        .oneshot(multipart_request("image", "text/plain", b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid file type: text/plain"));
    assert_eq!(app.media.upload_count(), 0);
}

#[tokio::test]
async fn missing_image_field_is_rejected() {
    let app = spawn_app();

    let response = app
        .router
        .oneshot(multipart_request("document", "image/png", &[0x89, 0x50]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No image file found in upload");
}

#[tokio::test]
async fn missing_media_credentials_yield_configuration_error() {
    let app = spawn_app_without_media_credentials();

    let response = app
        .oneshot(multipart_request("image", "image/jpeg", &[0xFF, 0xD8]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Server configuration error");
}
