//! Schema reconciliation.
//!
//! Checks the parsed reply for the fields a route requires, remaps known
//! legacy shapes into the current schema instead of failing outright, and
//! stamps operational metadata before the handler serializes the result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Score assumed for a legacy zone narrative with no recognizable number.
/// Fabricated data; logged at warn so it stays visible.
pub const LEGACY_DEFAULT_SCORE: u32 = 75;

#[derive(Debug, Error)]
#[error("Missing required fields in analysis: {}", missing.join(", "))]
pub struct ReconcileError {
    pub missing: Vec<String>,
}

static SCORE_OVER_100: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})\s*/\s*100").unwrap());
static SCORE_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:оценка|оцінка|score)\s*[:=\-]?\s*(\d{1,3})").unwrap());

/// Extract a 0–100 score from a legacy narrative; `NN/100` wins over a
/// labeled `оценка: NN` form.
pub fn extract_zone_score(narrative: &str) -> Option<u32> {
    SCORE_OVER_100
        .captures(narrative)
        .or_else(|| SCORE_LABELED.captures(narrative))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(|score| score.min(100))
}

fn category_for(mean: u32) -> &'static str {
    match mean {
        85..=100 => "excellent",
        70..=84 => "good",
        50..=69 => "fair",
        _ => "poor",
    }
}

/// Convert a legacy `zone -> narrative string` layout into the current
/// `zone -> {score, description}` records, and synthesize the aggregate
/// score and category when they are absent.
fn remap_legacy_zones(parsed: &mut Map<String, Value>) {
    let Some(Value::Object(zones)) = parsed.get_mut("zone_analysis") else {
        return;
    };

    let mut recovered = Vec::new();
    for (zone, value) in zones.iter_mut() {
        let Value::String(narrative) = value else {
            continue;
        };

        let score = match extract_zone_score(narrative) {
            Some(score) => score,
            None => {
                tracing::warn!(
                    zone = %zone,
                    "No score found in legacy zone narrative, assuming {}",
                    LEGACY_DEFAULT_SCORE
                );
                LEGACY_DEFAULT_SCORE
            }
        };
        recovered.push(score);

        *value = json!({
            "score": score,
            "description": narrative,
        });
    }

    if recovered.is_empty() {
        return;
    }

    tracing::info!(
        zones = recovered.len(),
        "Remapped legacy narrative zones into scored records"
    );

    if !parsed.contains_key("overall_score") {
        let mean =
            (recovered.iter().sum::<u32>() as f64 / recovered.len() as f64).round() as u32;
        parsed.insert("overall_score".to_string(), json!(mean));
        parsed
            .entry("category".to_string())
            .or_insert_with(|| json!(category_for(mean)));
    }
}

/// Check required fields, remapping the legacy zone shape first when the
/// route allows it. Mutates in place; terminal failure names the missing
/// fields.
pub fn reconcile(
    parsed: &mut Map<String, Value>,
    required_fields: &[&str],
    allow_legacy_zones: bool,
) -> Result<(), ReconcileError> {
    if allow_legacy_zones {
        remap_legacy_zones(parsed);
    }

    let missing: Vec<String> = required_fields
        .iter()
        .filter(|field| !parsed.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError { missing })
    }
}

/// Append operational metadata to a reconciled analysis.
pub fn stamp_metadata(
    parsed: &mut Map<String, Value>,
    model_used: &str,
    analysis_id: &str,
    analysis_type: &str,
) {
    parsed.insert("model_used".to_string(), json!(model_used));
    parsed.insert("analysis_id".to_string(), json!(analysis_id));
    parsed.insert("analysis_type".to_string(), json!(analysis_type));
    parsed.insert(
        "processed_at".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
}
