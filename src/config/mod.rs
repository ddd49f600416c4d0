// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for AetherPulse

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::AiError;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// AI engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Thermal feedback analytics settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Visuals lab settings
    #[serde(default)]
    pub visuals: VisualsConfig,

    /// R&D security audit settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_text_model")]
    pub text: String,
    #[serde(default = "default_image_model")]
    pub image: String,
}

/// Prompt templates. Placeholders in braces are substituted per request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// `{reviews}`
    #[serde(default = "default_feedback_prompt")]
    pub feedback: String,
    /// `{content}`
    #[serde(default = "default_hierarchy_prompt")]
    pub hierarchy: String,
    /// `{name}` and `{context}`
    #[serde(default = "default_sensitivity_prompt")]
    pub sensitivity: String,
    /// `{prompt}`
    #[serde(default = "default_asset_prompt")]
    pub asset: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyticsConfig {
    /// Number of days in each synthesized trend series
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    /// Multiplier applied to today's mention count
    #[serde(default = "default_mention_scale")]
    pub mention_scale: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VisualsConfig {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_export_basename")]
    pub export_basename: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuditConfig {
    /// Delay between simulated upload steps
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_progress_steps")]
    pub progress_steps: Vec<u8>,
    /// Metadata sent alongside every file name
    #[serde(default = "default_audit_context")]
    pub context: String,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Score at or above which an undecided verdict counts as flagged
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: f64,
}

/// What the audit panel records when the gateway cannot give a verdict
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// `{score: 0, status: safe}`
    #[default]
    FailOpen,
    /// `{score: 100, status: flagged}`
    FailClosed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Largest accepted upload request, in MiB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

// Default value functions
fn default_engine_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_api_key_env() -> String { "API_KEY".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_text_model() -> String { "gemini-3-flash-preview".to_string() }
fn default_image_model() -> String { "gemini-2.5-flash-image".to_string() }
fn default_history_days() -> u32 { 15 }
fn default_mention_scale() -> u32 { 10 }
fn default_aspect_ratio() -> String { "16:9".to_string() }
fn default_export_basename() -> String { "aethersole_asset".to_string() }
fn default_step_delay_ms() -> u64 { 800 }
fn default_progress_steps() -> Vec<u8> { vec![20, 40, 60, 80] }
fn default_flag_threshold() -> f64 { 50.0 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_max_upload_mb() -> usize { 256 }

fn default_audit_context() -> String {
    "R&D thermal testing footage for Cooling Soles.".to_string()
}

fn default_feedback_prompt() -> String {
    "Perform a thermal performance audit on these AetherSole customer reviews:\n\
     Reviews: {reviews}\n\
     Identify sentiment metrics related to cooling efficiency and heat dissipation.".to_string()
}

fn default_hierarchy_prompt() -> String {
    "Act as a senior systems architect. Extract a structured hierarchical module tree \
     from this AetherLabs R&D documentation:\n\nContent:\n{content}".to_string()
}

fn default_sensitivity_prompt() -> String {
    "Security Audit Request: Evaluate R&D testing video \"{name}\" with meta-data: \"{context}\". \
     Check for proprietary fan blade geometries or phase-change chemical disclosures.".to_string()
}

fn default_asset_prompt() -> String {
    "A professional, world-class high-tech advertisement photo of AetherSoles cooling shoe inserts. \
     Environment: {prompt}. Visual style: futuristic, frosted glass, blue thermal glowing trails, \
     extremely detailed texture, ice crystals. No text, no watermarks.".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            api_key_env: default_api_key_env(),
            models: ModelConfig::default(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            image: default_image_model(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            feedback: default_feedback_prompt(),
            hierarchy: default_hierarchy_prompt(),
            sensitivity: default_sensitivity_prompt(),
            asset: default_asset_prompt(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            mention_scale: default_mention_scale(),
        }
    }
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            export_basename: default_export_basename(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            progress_steps: default_progress_steps(),
            context: default_audit_context(),
            fallback: FallbackPolicy::default(),
            flag_threshold: default_flag_threshold(),
        }
    }
}

impl AuditConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl WebConfig {
    /// Request body limit for upload routes, in bytes
    pub fn upload_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::PulseError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the panels cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.analytics.history_days == 0 {
            return Err(crate::PulseError::Config(
                "analytics.history_days must be at least 1".to_string(),
            ));
        }

        let steps = &self.audit.progress_steps;
        if steps.iter().any(|p| *p <= 10 || *p >= 100) {
            return Err(crate::PulseError::Config(
                "audit.progress_steps must lie strictly between 10 and 100".to_string(),
            ));
        }
        if steps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(crate::PulseError::Config(
                "audit.progress_steps must be strictly increasing".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.audit.flag_threshold) {
            return Err(crate::PulseError::Config(
                "audit.flag_threshold must be between 0 and 100".to_string(),
            ));
        }

        Ok(())
    }

    /// Read the API key from the configured environment variable.
    ///
    /// Fails when the variable is missing or empty so that a misconfigured
    /// deployment stops at startup instead of on the first panel action.
    pub fn api_key(&self) -> std::result::Result<String, AiError> {
        match std::env::var(&self.engine.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(AiError::MissingApiKey {
                var: self.engine.api_key_env.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_suite() {
        let config = AppConfig::default();
        assert_eq!(config.engine.models.text, "gemini-3-flash-preview");
        assert_eq!(config.engine.models.image, "gemini-2.5-flash-image");
        assert_eq!(config.analytics.history_days, 15);
        assert_eq!(config.analytics.mention_scale, 10);
        assert_eq!(config.audit.progress_steps, vec![20, 40, 60, 80]);
        assert_eq!(config.audit.step_delay(), Duration::from_millis(800));
        assert_eq!(config.audit.fallback, FallbackPolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.web.port = 9191;
        config.audit.fallback = FallbackPolicy::FailClosed;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.web.port, 9191);
        assert_eq!(loaded.audit.fallback, FallbackPolicy::FailClosed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "audit": { "step_delay_ms": 0, "fallback": "fail_closed" } }"#).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.audit.step_delay_ms, 0);
        assert_eq!(loaded.audit.progress_steps, vec![20, 40, 60, 80]);
        assert_eq!(loaded.engine.api_key_env, "API_KEY");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.web.port, 8080);
    }

    #[test]
    fn test_rejects_unordered_steps() {
        let mut config = AppConfig::default();
        config.audit.progress_steps = vec![40, 20];
        assert!(config.validate().is_err());

        config.audit.progress_steps = vec![20, 100];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_missing_fails_fast() {
        let mut config = AppConfig::default();
        config.engine.api_key_env = "AETHERPULSE_TEST_UNSET_KEY".to_string();

        match config.api_key() {
            Err(AiError::MissingApiKey { var }) => assert_eq!(var, "AETHERPULSE_TEST_UNSET_KEY"),
            other => panic!("Expected MissingApiKey, got {:?}", other),
        }
    }
}
