//! Response recovery parser.
//!
//! Models reply with JSON wrapped in markdown fences, prose, HTML or with
//! small syntax defects. This module is a best-effort decoder with a strict
//! ordering of fallback strategies: normalize, extract the outermost
//! balanced object, strict-parse, then apply repairs one at a time until a
//! parse succeeds. Everything here is pure so it stays unit-testable in
//! isolation from network calls.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Upper bound on the raw-text preview attached to terminal errors.
pub const PREVIEW_LIMIT: usize = 500;

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
    /// First `PREVIEW_LIMIT` characters of the offending raw text.
    pub raw_preview: String,
}

impl ParseError {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw_preview: preview(raw),
        }
    }
}

pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_LIMIT).collect()
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&[a-zA-Z#0-9]+;").unwrap());
static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1F\x7F]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)"#).unwrap());

/// Stage 1: strip fences, HTML tags and entities, control characters and
/// literal escaped whitespace sequences. Cleaning already-clean JSON is a
/// no-op apart from whitespace collapsing, which JSON tolerates.
pub fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    text = FENCE_OPEN.replace_all(&text, "").into_owned();
    text = HTML_TAG.replace_all(&text, "").into_owned();
    text = HTML_ENTITY.replace_all(&text, "").into_owned();
    text = CONTROL_CHARS.replace_all(&text, "").into_owned();
    text = text
        .replace("\\n", " ")
        .replace("\\r", " ")
        .replace("\\t", " ");
    text = WHITESPACE_RUN.replace_all(&text, " ").into_owned();

    text.trim().to_string()
}

/// Stage 2: locate the first `{` and scan forward tracking brace depth
/// (string- and escape-aware) to its matching `}`.
pub fn extract_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Stage 4 repairs, applied in order and re-parsed after each one.
const REPAIR_PASSES: [fn(&str) -> String; 3] =
    [normalize_quotes, strip_trailing_commas, quote_bare_keys];

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace("\\\"", "\"")
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

fn quote_bare_keys(text: &str) -> String {
    BARE_KEY.replace_all(text, "$1\"$2\"$3").into_owned()
}

/// Stages 1–3 only: normalize, extract, strict parse. Used for the reply of
/// the strict re-query, where repairs are not attempted.
pub fn parse_strict(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let cleaned = clean_reply(raw);
    let candidate = extract_candidate(&cleaned)
        .ok_or_else(|| ParseError::new("no JSON structure found", raw))?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::new("top-level JSON value is not an object", raw)),
        Err(e) => Err(ParseError::new(format!("JSON parse failed: {}", e), raw)),
    }
}

/// Stages 1–4: strict parse followed by ordered repairs, stopping at the
/// first success.
pub fn parse_recovered(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let cleaned = clean_reply(raw);
    let candidate = extract_candidate(&cleaned)
        .ok_or_else(|| ParseError::new("no JSON structure found", raw))?;

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
        return Ok(map);
    }

    // Repairs compound: each pass starts from the output of the previous one
    // so a reply with several small defects still recovers.
    let mut current = candidate.to_string();
    for (stage, repair) in REPAIR_PASSES.iter().enumerate() {
        current = repair(&current);
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&current) {
            tracing::debug!(stage = stage + 1, "JSON recovered after repair pass");
            return Ok(map);
        }
    }

    Err(ParseError::new(
        "could not extract valid JSON from response",
        raw,
    ))
}
