// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AetherPulse: AetherLabs Thermal Suite
//!
//! Four dashboard panels (thermal feedback analytics, visuals lab, extraction
//! agent, R&D security audit) backed by a single Gemini gateway.

pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod lifecycle;
pub mod panels;
pub mod web;

pub use config::AppConfig;
pub use error::{AiError, PulseError, Result};
