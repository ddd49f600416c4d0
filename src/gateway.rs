// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI gateway: the only module that calls the generative model.
//!
//! Each operation builds its request, asks for a schema-constrained response
//! where the output is structured, and validates the reply into typed values.
//! All four return `Result<_, AiError>` and never substitute defaults.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ModelConfig, PromptConfig};
use crate::gemini::{GenerateRequest, GenerativeModel, OutputConstraint};
use crate::AiError;

/// A review assigned to a topic by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMapping {
    pub review_index: usize,
    pub topic_name: String,
}

/// A submodule as returned by the model, in response order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    pub name: String,
    pub description: String,
}

/// One module of an extracted hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedModule {
    pub module: String,
    pub description: String,
    #[serde(rename = "submoduleItems", default)]
    pub submodules: Vec<Submodule>,
}

/// Status of an audited video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Processing,
    Safe,
    Flagged,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Processing => "processing",
            AuditStatus::Safe => "safe",
            AuditStatus::Flagged => "flagged",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "processing" => Some(AuditStatus::Processing),
            "safe" => Some(AuditStatus::Safe),
            "flagged" => Some(AuditStatus::Flagged),
            _ => None,
        }
    }
}

/// Risk verdict for a video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAssessment {
    /// Risk percentage, 0-100
    pub score: f64,
    pub status: AuditStatus,
}

impl SensitivityAssessment {
    /// The fail-open default: nothing detected
    pub fn fail_open() -> Self {
        Self { score: 0.0, status: AuditStatus::Safe }
    }

    /// The fail-closed default: treat as maximally sensitive
    pub fn fail_closed() -> Self {
        Self { score: 100.0, status: AuditStatus::Flagged }
    }
}

/// A generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    /// Render as a `data:` URI for inline display
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, general_purpose::STANDARD.encode(&self.bytes))
    }

    /// File extension matching the image format
    pub fn extension(&self) -> &'static str {
        image::ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png")
    }
}

#[derive(Deserialize)]
struct FeedbackPayload {
    #[serde(default)]
    mappings: Vec<WireMapping>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMapping {
    review_index: i64,
    topic_name: String,
}

#[derive(Deserialize)]
struct SensitivityPayload {
    score: f64,
    status: String,
}

/// Typed front for the generative model
#[derive(Clone)]
pub struct AiGateway {
    model: Arc<dyn GenerativeModel>,
    models: ModelConfig,
    prompts: PromptConfig,
    aspect_ratio: String,
}

impl AiGateway {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &AppConfig) -> Self {
        Self {
            model,
            models: config.engine.models.clone(),
            prompts: config.prompts.clone(),
            aspect_ratio: config.visuals.aspect_ratio.clone(),
        }
    }

    /// Generate a product image for the given environment description.
    ///
    /// Returns `Ok(None)` when the provider answers without an image.
    pub async fn generate_asset(&self, prompt: &str) -> Result<Option<ImageAsset>, AiError> {
        let request = GenerateRequest {
            model: self.models.image.clone(),
            prompt: self.prompts.asset.replace("{prompt}", prompt),
            output: OutputConstraint::Image { aspect_ratio: self.aspect_ratio.clone() },
        };

        info!("Requesting asset generation: model={}", request.model);
        let response = self.model.generate_content(&request).await?;

        let Some((mime_type, data)) = response.first_inline_data() else {
            warn!("Provider returned no image for asset prompt");
            return Ok(None);
        };

        let bytes = general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| AiError::Generation(format!("Image payload is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(AiError::Generation("Image payload is empty".to_string()));
        }

        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| mime_type.to_string());

        debug!("Received {} byte {} asset", bytes.len(), mime_type);
        Ok(Some(ImageAsset { mime_type, bytes }))
    }

    /// Assign each review to a thermal performance topic.
    ///
    /// Mappings pointing outside `reviews` are dropped.
    pub async fn analyze_feedback(&self, reviews: &[String]) -> Result<Vec<TopicMapping>, AiError> {
        let request = GenerateRequest {
            model: self.models.text.clone(),
            prompt: self.prompts.feedback.replace("{reviews}", &reviews.join(" | ")),
            output: OutputConstraint::Json { schema: feedback_schema() },
        };

        info!("Requesting feedback analysis for {} reviews", reviews.len());
        let text = self.model.generate_content(&request).await?.text();
        let payload: FeedbackPayload = parse_json(&text)?;

        let mut mappings = Vec::with_capacity(payload.mappings.len());
        for m in payload.mappings {
            match usize::try_from(m.review_index) {
                Ok(index) if index < reviews.len() => mappings.push(TopicMapping {
                    review_index: index,
                    topic_name: m.topic_name,
                }),
                _ => warn!("Dropping mapping with out-of-range review index {}", m.review_index),
            }
        }

        debug!("Feedback analysis produced {} mappings", mappings.len());
        Ok(mappings)
    }

    /// Extract a module hierarchy from unstructured documentation
    pub async fn extract_hierarchy(&self, content: &str) -> Result<Vec<ExtractedModule>, AiError> {
        let request = GenerateRequest {
            model: self.models.text.clone(),
            prompt: self.prompts.hierarchy.replace("{content}", content),
            output: OutputConstraint::Json { schema: hierarchy_schema() },
        };

        info!("Requesting hierarchy extraction ({} chars)", content.len());
        let text = self.model.generate_content(&request).await?.text();
        let modules: Vec<ExtractedModule> = parse_json(&text)?;

        debug!("Extracted {} modules", modules.len());
        Ok(modules)
    }

    /// Score a video's risk of disclosing proprietary information
    pub async fn assess_sensitivity(&self, label: &str, context: &str) -> Result<SensitivityAssessment, AiError> {
        let request = GenerateRequest {
            model: self.models.text.clone(),
            prompt: fill_template(&self.prompts.sensitivity, &[("{name}", label), ("{context}", context)]),
            output: OutputConstraint::Json { schema: sensitivity_schema() },
        };

        info!("Requesting sensitivity audit for {:?}", label);
        let text = self.model.generate_content(&request).await?.text();
        let payload: SensitivityPayload = parse_json(&text)?;

        let status = AuditStatus::parse(&payload.status)
            .ok_or_else(|| AiError::SchemaMismatch(format!("Unknown status {:?}", payload.status)))?;
        if !payload.score.is_finite() {
            return Err(AiError::SchemaMismatch("Score is not a finite number".to_string()));
        }
        let score = payload.score.clamp(0.0, 100.0);
        if score != payload.score {
            warn!("Clamped out-of-range sensitivity score {}", payload.score);
        }

        Ok(SensitivityAssessment { score, status })
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, AiError> {
    if text.trim().is_empty() {
        return Err(AiError::SchemaMismatch("Empty response body".to_string()));
    }
    serde_json::from_str(text).map_err(|e| AiError::SchemaMismatch(e.to_string()))
}

fn feedback_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "mappings": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "reviewIndex": { "type": "INTEGER" },
                        "topicName": {
                            "type": "STRING",
                            "description": "Metric like Heat Dissipation or Active Cooling"
                        }
                    },
                    "required": ["reviewIndex", "topicName"]
                }
            }
        }
    })
}

fn hierarchy_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "module": { "type": "STRING" },
                "description": { "type": "STRING" },
                "submoduleItems": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": { "type": "STRING" },
                            "description": { "type": "STRING" }
                        },
                        "required": ["name", "description"]
                    }
                }
            },
            "required": ["module", "description", "submoduleItems"]
        }
    })
}

fn sensitivity_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER", "description": "Risk percentage 0-100" },
            "status": { "type": "STRING", "description": "One of: safe, processing, flagged" }
        },
        "required": ["score", "status"]
    })
}

/// Substitute placeholders in one left-to-right pass, so inserted values
/// are never scanned for further placeholders.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while !rest.is_empty() {
        match values.iter().find(|(key, _)| rest.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                let ch = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&rest[..ch]);
                rest = &rest[ch..];
            }
        }
    }
    out
}
