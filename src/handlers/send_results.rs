//! Emailing a finished analysis report.
//!
//! The HTML template is inlined-style markup so it renders in every mail
//! client. Score and interpretation fields are looked up under both the
//! current and the legacy key names.

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::AppError;
use crate::models::SendResultsRequest;
use crate::services::providers::EmailMessage;
use crate::startup::AppState;

const SUBJECT: &str = "🔬 Ваш звіт готовий - Health Analyzer";

#[tracing::instrument(skip(state, body))]
pub async fn send_results(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: SendResultsRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid JSON in request body")))?;
    request.validate()?;

    let html = render_report(
        &request.analysis_data,
        request.image_url.as_deref(),
        request.analysis_type.as_deref(),
    );

    let message = EmailMessage {
        to: request.email.clone(),
        subject: SUBJECT.to_string(),
        body_html: html,
    };

    state
        .email
        .send(&message)
        .await
        .map_err(|e| AppError::EmailError(e.to_string()))?;

    tracing::info!(analysis_type = ?request.analysis_type, "Report email sent");

    Ok(Json(json!({
        "success": true,
        "message": "Email sent successfully"
    })))
}

/// A score field may arrive as a number or a string like "82/100 баллов".
fn display_value(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn render_parameter(name: &str, score: &str, description: &str) -> String {
    format!(
        r#"<div style="margin: 16px 0; padding: 16px; background: #f9fafb; border-radius: 8px; border-left: 4px solid #3B82F6;">
  <div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 8px;">
    <strong style="color: #111827; font-size: 16px;">{name}</strong>
    <span style="font-size: 20px; font-weight: bold; color: #3B82F6;">{score}</span>
  </div>
  <p style="color: #6b7280; margin: 8px 0 0 0; font-size: 14px; line-height: 1.5;">{description}</p>
</div>"#
    )
}

fn detailed_parameters(data: &Value) -> String {
    let Some(findings) = data.get("objective_findings").and_then(Value::as_object) else {
        return String::new();
    };

    let params = [
        ("color", "Колір"),
        ("coating", "Наліт"),
        ("cracks", "Тріщини"),
        ("edges", "Краї"),
        ("papillae", "Сосочки"),
    ];

    params
        .iter()
        .filter_map(|(key, name)| {
            let param = findings.get(*key)?;
            let score = display_value(param.get("score")).unwrap_or_else(|| "-".to_string());
            let description = param
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            Some(render_parameter(name, &format!("{score}/10"), description))
        })
        .collect()
}

fn comprehensive_parameters(data: &Value) -> String {
    let Some(zones) = data.get("zone_analysis").and_then(Value::as_object) else {
        return String::new();
    };

    let zone_names = [
        ("anterior", "Передня зона (Серце/Легені)"),
        ("middle", "Середня зона (Шлунок/Селезінка)"),
        ("posterior", "Задня зона (Нирки/Сеча)"),
        ("lateral", "Бокові зони (Печінка/Жовчний)"),
    ];

    zones
        .iter()
        .filter_map(|(key, zone)| {
            let zone = zone.as_object()?;
            let name = zone_names
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, n)| *n)
                .unwrap_or(key.as_str());
            let score = display_value(zone.get("score")).unwrap_or_else(|| "-".to_string());
            let interpretation = zone
                .get("interpretation")
                .and_then(Value::as_str)
                .or_else(|| zone.get("description").and_then(Value::as_str))
                .unwrap_or("");
            Some(render_parameter(name, &format!("{score}/100"), interpretation))
        })
        .collect()
}

fn render_report(data: &Value, image_url: Option<&str>, analysis_type: Option<&str>) -> String {
    let overall_score = display_value(data.get("overall_score"))
        .or_else(|| display_value(data.get("overall_health_score")))
        .unwrap_or_else(|| "N/A".to_string());
    let category = display_value(data.get("category"))
        .or_else(|| display_value(data.get("health_status")))
        .unwrap_or_default();
    let interpretation = display_value(data.get("interpretation"))
        .or_else(|| display_value(data.get("health_interpretation")))
        .unwrap_or_default();

    let scale = if analysis_type == Some("detailed") {
        "/10"
    } else {
        "/100"
    };

    let parameters = match analysis_type {
        Some("detailed") => detailed_parameters(data),
        Some("comprehensive") => comprehensive_parameters(data),
        _ => String::new(),
    };

    let image_block = image_url
        .map(|url| {
            format!(
                r#"<div style="text-align: center; margin-bottom: 32px;">
  <img src="{url}" alt="Фото язика" style="max-width: 100%; height: auto; border-radius: 12px; box-shadow: 0 4px 12px rgba(0,0,0,0.1);">
</div>"#
            )
        })
        .unwrap_or_default();

    let category_block = if category.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div style="font-size: 16px; color: #4b5563; font-weight: 500;">{category}</div>"#
        )
    };

    let interpretation_block = if interpretation.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div style="padding: 20px; background: #FEF3C7; border-left: 4px solid #F59E0B; border-radius: 8px; margin-bottom: 32px;">
  <h3 style="color: #92400E; margin: 0 0 12px 0; font-size: 16px; font-weight: 600;">💡 Інтерпретація</h3>
  <p style="color: #78350F; margin: 0; line-height: 1.6; font-size: 14px;">{interpretation}</p>
</div>"#
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f3f4f6;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff;">
    <div style="background: linear-gradient(135deg, #3B82F6 0%, #2563EB 100%); padding: 40px 32px; text-align: center;">
      <h1 style="color: #ffffff; margin: 0; font-size: 28px; font-weight: 700;">🔬 Ваш звіт готовий!</h1>
      <p style="color: rgba(255,255,255,0.9); margin: 12px 0 0 0; font-size: 16px;">Health Analyzer ABU</p>
    </div>
    <div style="padding: 32px;">
      {image_block}
      <div style="text-align: center; margin-bottom: 32px; padding: 24px; background: linear-gradient(135deg, #EEF2FF 0%, #E0E7FF 100%); border-radius: 16px;">
        <div style="font-size: 14px; color: #6b7280; text-transform: uppercase; letter-spacing: 1px; margin-bottom: 8px;">Загальна оцінка</div>
        <div style="font-size: 56px; font-weight: 700; color: #3B82F6; line-height: 1; margin-bottom: 8px;">{overall_score}{scale}</div>
        {category_block}
      </div>
      <div style="margin-bottom: 32px;">
        <h2 style="color: #111827; font-size: 22px; margin-bottom: 20px; font-weight: 600;">Детальні параметри</h2>
        {parameters}
      </div>
      {interpretation_block}
      <div style="text-align: center; margin: 32px 0;">
        <a href="https://mycheck.com.ua" style="display: inline-block; padding: 16px 32px; background: #3B82F6; color: #ffffff; text-decoration: none; border-radius: 10px; font-weight: 600; font-size: 16px;">Зробити новий аналіз</a>
      </div>
      <div style="padding: 20px; background: #FEE2E2; border-radius: 8px; margin-top: 32px;">
        <p style="color: #991B1B; margin: 0; font-size: 13px; line-height: 1.5;">
          ⚠️ <strong>Важливо:</strong> Це wellness-аналіз для інформаційних цілей.
          Не є медичною діагностикою та не замінює консультацію лікаря.
          При серйозних симптомах зверніться до медичного фахівця.
        </p>
      </div>
    </div>
    <div style="background: #f9fafb; padding: 24px 32px; text-align: center; border-top: 1px solid #e5e7eb;">
      <p style="color: #6b7280; margin: 0; font-size: 14px;">Health Analyzer ABU • mycheck.com.ua</p>
      <p style="color: #9ca3af; margin: 8px 0 0 0; font-size: 12px;">Аналіз здоров'я на основі AI</p>
    </div>
  </div>
</body>
</html>"#
    )
}
