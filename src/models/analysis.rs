use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Output language requested by the client. The language directive is woven
/// into the system prompt; rate-limit messages are localized with it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    Ua,
}

impl Language {
    pub fn directive(&self) -> &'static str {
        match self {
            Language::Ru => "Отвечай на русском языке.",
            Language::Ua => "Відповідай українською мовою.",
        }
    }

    pub fn rate_limit_message(&self) -> &'static str {
        match self {
            Language::Ru => "Сервис перегружен, попробуйте позже.",
            Language::Ua => "Сервіс перевантажено, спробуйте пізніше.",
        }
    }
}

/// Body accepted by every analysis route. `analysis_url`, when present, is
/// the enhanced rendition and wins over `image_url` as the model input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_url: Option<String>,
    pub analysis_url: Option<String>,
    /// Prior-stage output passed as extra grounding for the model.
    pub detailed_analysis: Option<String>,
    #[serde(default)]
    pub language: Language,
    pub analysis_id: Option<String>,
    pub timestamp: Option<String>,
}

impl AnalyzeRequest {
    pub fn source_url(&self) -> Option<&str> {
        self.analysis_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.image_url.as_deref().filter(|u| !u.is_empty()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub analysis_url: String,
    pub original_url: String,
    pub public_id: String,
    pub unique_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendResultsRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    pub analysis_data: Value,
    pub image_url: Option<String>,
    /// "detailed" or "comprehensive"; anything else renders the generic report.
    pub analysis_type: Option<String>,
}
