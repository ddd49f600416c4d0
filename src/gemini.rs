// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Gemini `generateContent` client and the injectable model boundary

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{AiError, AppConfig};

/// How the provider is asked to shape its output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputConstraint {
    /// Free-form text
    Text,
    /// An inline image with the given aspect ratio (e.g. `16:9`)
    Image { aspect_ratio: String },
    /// JSON conforming to a response schema
    Json { schema: serde_json::Value },
}

/// A single provider request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub output: OutputConstraint,
}

/// One part of a candidate's content
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/// Parts of the first candidate returned by the provider
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateResponse {
    pub parts: Vec<ContentPart>,
}

impl GenerateResponse {
    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect()
    }

    /// First inline payload as `(mime_type, base64 data)`
    pub fn first_inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::InlineData { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            ContentPart::Text(_) => None,
        })
    }
}

/// The external generative capability.
///
/// Only the gateway talks to implementations of this trait; tests swap in
/// scripted models.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError>;
}

/// Gemini REST API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireRequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct WireRequestContent<'a> {
    role: &'static str,
    parts: Vec<WireTextPart<'a>>,
}

#[derive(Serialize)]
struct WireTextPart<'a> {
    text: &'a str,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig<'a> {
    aspect_ratio: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    inline_data: Option<WireInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder().timeout(timeout).build()?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/v1beta")
            .to_string();

        Ok(Self { client, base_url, api_key })
    }

    /// Build a client from configuration, failing fast without an API key
    pub fn from_config(config: &AppConfig) -> Result<Self, AiError> {
        let api_key = config.api_key()?;
        Self::new(&config.engine.url, api_key, Duration::from_secs(config.engine.timeout_secs))
    }

    /// Check that the API is reachable with the configured key
    pub async fn health_check(&self) -> Result<(), AiError> {
        self.list_models().await.map(|_| ())
    }

    /// List model names available to this key
    pub async fn list_models(&self) -> Result<Vec<String>, AiError> {
        let url = format!("{}/v1beta/models", self.base_url);

        let response = self.client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &body));
        }

        let models: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::Generation(format!("Unreadable model list: {}", e)))?;
        Ok(models
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, request.model);

        debug!("Sending request to Gemini: model={}", request.model);

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_wire_request(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &body));
        }

        parse_generate_response(&body)
    }
}

fn build_wire_request(request: &GenerateRequest) -> WireRequest<'_> {
    let generation_config = match &request.output {
        OutputConstraint::Text => None,
        OutputConstraint::Image { aspect_ratio } => Some(GenerationConfig {
            response_modalities: Some(vec!["TEXT", "IMAGE"]),
            image_config: Some(ImageConfig { aspect_ratio }),
            ..Default::default()
        }),
        OutputConstraint::Json { schema } => Some(GenerationConfig {
            response_mime_type: Some("application/json"),
            response_schema: Some(schema),
            ..Default::default()
        }),
    };

    WireRequest {
        contents: vec![WireRequestContent {
            role: "user",
            parts: vec![WireTextPart { text: &request.prompt }],
        }],
        generation_config,
    }
}

fn provider_error(status: u16, body: &str) -> AiError {
    let message = serde_json::from_str::<WireErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    AiError::Provider { status, message }
}

/// Parse a `generateContent` body into the parts of its first candidate
pub fn parse_generate_response(body: &str) -> Result<GenerateResponse, AiError> {
    let wire: WireResponse = serde_json::from_str(body)
        .map_err(|e| AiError::Generation(format!("Malformed provider response: {}", e)))?;

    let candidate = wire
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Generation("Provider returned no candidates".to_string()))?;

    let parts = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| match (p.inline_data, p.text) {
            (Some(inline), _) => Some(ContentPart::InlineData {
                mime_type: inline.mime_type.unwrap_or_else(|| "image/png".to_string()),
                data: inline.data,
            }),
            (None, Some(text)) => Some(ContentPart::Text(text)),
            (None, None) => None,
        })
        .collect();

    Ok(GenerateResponse { parts })
}
