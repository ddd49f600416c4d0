// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Extraction agent: unstructured documentation to a module hierarchy

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AppSection, Panel};
use crate::gateway::{AiGateway, ExtractedModule};
use crate::lifecycle::{Lifecycle, MountToken};

/// Submitted when the caller supplies no document text
pub const PLACEHOLDER_DOCUMENT: &str = "\
AetherSoles Documentation - Alpha Phase:
1. Thermal Management Core: Covers the active fan and phase change logic.
   - Active Fan PWM: Control logic for the internal ventilation module.
   - Safety Shutoff: Emergency protocols if sole temperature exceeds 45°C.
2. Power & Logistics: Battery specifications and charging protocols.
   - Wireless Docking: Qi-compatible charging station requirements.
   - Battery Calibration: Maintaining performance across 500 charge cycles.
";

/// A module with its submodules keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module: String,
    pub description: String,
    pub submodules: BTreeMap<String, String>,
}

impl From<ExtractedModule> for ModuleInfo {
    /// Later submodules overwrite earlier ones with the same name
    fn from(extracted: ExtractedModule) -> Self {
        let submodules = extracted
            .submodules
            .into_iter()
            .map(|s| (s.name, s.description))
            .collect();

        Self {
            module: extracted.module,
            description: extracted.description,
            submodules,
        }
    }
}

/// What the user submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractionRequest {
    /// Reference to the source documentation; recorded, not fetched
    #[serde(default)]
    pub url: Option<String>,
    /// Document body to analyse
    #[serde(default)]
    pub text: Option<String>,
}

impl ExtractionRequest {
    fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// A submission needs either a reference or a body
    pub fn is_submittable(&self) -> bool {
        self.url().is_some() || self.text().is_some()
    }

    /// The document actually sent to the gateway
    pub fn document(&self) -> &str {
        self.text().unwrap_or(PLACEHOLDER_DOCUMENT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ExtractionState {
    #[default]
    Idle,
    Loading { source: Option<String> },
    Displaying { source: Option<String>, modules: Vec<ModuleInfo> },
    Failed { message: String },
}

#[derive(Debug, Clone)]
pub enum ExtractionEvent {
    Submitted { source: Option<String> },
    Extracted(Vec<ModuleInfo>),
    Failed(String),
}

impl ExtractionState {
    pub fn apply(self, event: ExtractionEvent) -> Self {
        match (self, event) {
            (state @ ExtractionState::Loading { .. }, ExtractionEvent::Submitted { .. }) => state,
            (_, ExtractionEvent::Submitted { source }) => ExtractionState::Loading { source },
            (ExtractionState::Loading { source }, ExtractionEvent::Extracted(modules)) => {
                ExtractionState::Displaying { source, modules }
            }
            (ExtractionState::Loading { .. }, ExtractionEvent::Failed(message)) => {
                ExtractionState::Failed { message }
            }
            (state, _) => state,
        }
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        match self {
            ExtractionState::Displaying { modules, .. } => modules,
            _ => &[],
        }
    }

    /// Pretty-printed JSON of the hierarchy (the clipboard payload)
    pub fn pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self.modules())
    }
}

/// Extraction agent panel
#[derive(Clone)]
pub struct ExtractionPanel {
    gateway: AiGateway,
    state: Arc<RwLock<ExtractionState>>,
    lifecycle: Arc<Lifecycle>,
}

impl ExtractionPanel {
    pub fn new(gateway: AiGateway) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(ExtractionState::default())),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub async fn snapshot(&self) -> ExtractionState {
        self.state.read().await.clone()
    }

    /// Run an extraction and wait for it
    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractionState {
        if !request.is_submittable() {
            debug!("Ignoring empty extraction request");
            return self.snapshot().await;
        }

        let mut token = self.lifecycle.current();
        {
            let mut state = self.state.write().await;
            if !token.is_live() || matches!(*state, ExtractionState::Loading { .. }) {
                return state.clone();
            }
            let source = request.url().map(String::from);
            *state = std::mem::take(&mut *state).apply(ExtractionEvent::Submitted { source });
        }

        let document = request.document();
        if request.text().is_none() {
            info!("No document body supplied, submitting placeholder documentation");
        }

        let Some(result) = token.run(self.gateway.extract_hierarchy(document)).await else {
            debug!("Extraction panel unmounted during extraction");
            return self.snapshot().await;
        };

        let event = match result {
            Ok(extracted) => {
                let modules: Vec<ModuleInfo> = extracted.into_iter().map(ModuleInfo::from).collect();
                info!("Extracted {} modules", modules.len());
                ExtractionEvent::Extracted(modules)
            }
            Err(e) => {
                warn!("Extraction failure: {}", e);
                ExtractionEvent::Failed(e.to_string())
            }
        };
        self.apply(&token, event).await;
        self.snapshot().await
    }

    async fn apply(&self, token: &MountToken, event: ExtractionEvent) {
        let mut state = self.state.write().await;
        if token.is_live() {
            *state = std::mem::take(&mut *state).apply(event);
        }
    }
}

#[async_trait]
impl Panel for ExtractionPanel {
    fn section(&self) -> AppSection {
        AppSection::ExtractionAgent
    }

    async fn mount(&self) {
        self.lifecycle.mount();
        *self.state.write().await = ExtractionState::default();
    }

    async fn unmount(&self) {
        self.lifecycle.unmount();
        *self.state.write().await = ExtractionState::default();
    }
}
