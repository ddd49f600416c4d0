// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for AetherPulse

use thiserror::Error;

/// Result type alias for AetherPulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Errors returned by the AI gateway.
///
/// Every gateway operation returns `Result<T, AiError>`; choosing a
/// fallback is left to the panel that made the call.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not found in environment variable {var}")]
    MissingApiKey { var: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Response did not match schema: {0}")]
    SchemaMismatch(String),
}

/// AetherPulse error types
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Document error: {0}")]
    Document(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}
