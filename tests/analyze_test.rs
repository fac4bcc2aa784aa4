mod common;

use analyzer_service::services::providers::ProviderError;
use axum::http::{header, StatusCode};
use serde_json::json;
use tower::util::ServiceExt;

use common::{body_json, json_request, spawn_app, spawn_app_with_script, spawn_image_server};

#[tokio::test]
async fn malformed_json_body_is_rejected_without_any_model_call() {
    let app = spawn_app();

    let response = app
        .router
        .oneshot(json_request("/api/analyze", "{invalid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "error": "Invalid JSON in request body" }));
    assert_eq!(app.vision.call_count(), 0);
}

#[tokio::test]
async fn missing_image_url_is_rejected() {
    let app = spawn_app();

    let response = app
        .router
        .oneshot(json_request("/api/analyze-detailed", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Image URL required");
    assert_eq!(app.vision.call_count(), 0);
}

#[tokio::test]
async fn unreachable_image_url_is_rejected_without_any_model_call() {
    let app = spawn_app();

    let request_body = json!({ "imageUrl": "http://127.0.0.1:9/no-such-image.jpg" }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to fetch image from provided URL");
    assert_eq!(app.vision.call_count(), 0);
}

#[tokio::test]
async fn oversize_remote_image_is_rejected_without_any_model_call() {
    let app = spawn_app();
    let image_base = common::spawn_oversize_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("byte limit"));
    assert_eq!(app.vision.call_count(), 0);
}

#[tokio::test]
async fn successful_analysis_is_stamped_with_metadata() {
    let app = spawn_app();
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["detailed_analysis"], "Mock analysis");
    assert_eq!(body["model_used"], common::PRIMARY_MODEL);
    assert_eq!(body["analysis_type"], "basic");
    assert!(body["analysis_id"].as_str().unwrap().starts_with("basic_"));
    assert!(body["processed_at"].is_string());
    assert_eq!(app.vision.call_count(), 1);
}

#[tokio::test]
async fn analysis_url_wins_over_image_url() {
    let app = spawn_app();
    let image_base = spawn_image_server().await;

    let request_body = json!({
        "imageUrl": "http://127.0.0.1:9/unreachable.jpg",
        "analysisUrl": format!("{image_base}/image.jpg")
    })
    .to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn primary_failure_falls_back_to_secondary_model() {
    let app = spawn_app_with_script(vec![
        Err(ProviderError::ApiError("Anthropic API error 500".to_string())),
        Ok(r#"{"detailed_analysis":"Recovered by fallback"}"#.to_string()),
    ]);
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze-detailed", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["detailed_analysis"], "Recovered by fallback");
    assert_eq!(body["model_used"], common::FALLBACK_MODEL);
    assert_eq!(app.vision.call_count(), 2);
}

#[tokio::test]
async fn double_failure_surfaces_both_attempt_details() {
    let app = spawn_app_with_script(vec![
        Err(ProviderError::Timeout(60)),
        Err(ProviderError::ApiError("still down".to_string())),
    ]);
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("AI analysis failed"));
    assert!(error.contains(common::PRIMARY_MODEL));
    assert!(error.contains(common::FALLBACK_MODEL));
    assert_eq!(app.vision.call_count(), 2);
}

#[tokio::test]
async fn rate_limited_provider_yields_localized_429() {
    let app = spawn_app_with_script(vec![
        Err(ProviderError::RateLimited),
        Err(ProviderError::RateLimited),
    ]);
    let image_base = spawn_image_server().await;

    let request_body = json!({
        "imageUrl": format!("{image_base}/image.jpg"),
        "language": "ua"
    })
    .to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze-comprehensive", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["retry_after"], 30);
    assert_eq!(body["error"], "Сервіс перевантажено, спробуйте пізніше.");
}

#[tokio::test]
async fn unparseable_reply_triggers_one_strict_requery() {
    let app = spawn_app_with_script(vec![
        Ok("The sample looks healthy overall, no JSON here.".to_string()),
        Ok(r#"{"detailed_analysis":"Strict retry answer"}"#.to_string()),
    ]);
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze-detailed", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["detailed_analysis"], "Strict retry answer");
    // model_used reflects the model that answered, even when re-queried
    assert_eq!(body["model_used"], common::PRIMARY_MODEL);
    assert_eq!(app.vision.call_count(), 2);
}

#[tokio::test]
async fn legacy_zone_strings_are_remapped_with_scores() {
    let reply = json!({
        "zone_analysis": {
            "anterior": "Кончик розовый, оценка 82/100, без особенностей",
            "middle": "Центральная зона с легким налетом, оценка: 74",
            "posterior": "Корень без изменений",
            "lateral": "Края ровные, score 90/100"
        },
        "health_interpretation": "Хорошее общее состояние"
    })
    .to_string();
    let app = spawn_app_with_script(vec![Ok(reply)]);
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze-comprehensive", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["zone_analysis"]["anterior"]["score"], 82);
    assert_eq!(body["zone_analysis"]["middle"]["score"], 74);
    // no score in the narrative falls back to the neutral default
    assert_eq!(body["zone_analysis"]["posterior"]["score"], 75);
    assert_eq!(body["zone_analysis"]["lateral"]["score"], 90);
    // mean of 82, 74, 75, 90
    assert_eq!(body["overall_score"], 80);
    assert_eq!(body["category"], "good");
    assert_eq!(body["analysis_type"], "comprehensive");
}

#[tokio::test]
async fn fenced_json_reply_is_recovered_without_requery() {
    let reply = "```json\n{\"detailed_analysis\": \"Fenced but fine\"}\n```".to_string();
    let app = spawn_app_with_script(vec![Ok(reply)]);
    let image_base = spawn_image_server().await;

    let request_body = json!({ "imageUrl": format!("{image_base}/image.jpg") }).to_string();
    let response = app
        .router
        .oneshot(json_request("/api/analyze-detailed", &request_body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["detailed_analysis"], "Fenced but fine");
    assert_eq!(app.vision.call_count(), 1);
}
