// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AetherVisuals lab: prompt-to-image generation and export

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AppSection, Panel};
use crate::gateway::{AiGateway, ImageAsset};
use crate::lifecycle::{Lifecycle, MountToken};
use crate::AppConfig;

const NO_IMAGE_NOTICE: &str = "The model returned no image for this prompt.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualsState {
    Idle { notice: Option<String> },
    Generating { prompt: String },
    Displaying { prompt: String, asset: ImageAsset },
}

impl Default for VisualsState {
    fn default() -> Self {
        VisualsState::Idle { notice: None }
    }
}

#[derive(Debug, Clone)]
pub enum VisualsEvent {
    Submitted(String),
    Generated(Option<ImageAsset>),
    Failed(String),
}

impl VisualsState {
    pub fn apply(self, event: VisualsEvent) -> Self {
        match (self, event) {
            // trigger is disabled while a generation is running
            (state @ VisualsState::Generating { .. }, VisualsEvent::Submitted(_)) => state,
            (_, VisualsEvent::Submitted(prompt)) => VisualsState::Generating { prompt },
            (VisualsState::Generating { prompt }, VisualsEvent::Generated(Some(asset))) => {
                VisualsState::Displaying { prompt, asset }
            }
            (VisualsState::Generating { .. }, VisualsEvent::Generated(None)) => VisualsState::Idle {
                notice: Some(NO_IMAGE_NOTICE.to_string()),
            },
            (VisualsState::Generating { .. }, VisualsEvent::Failed(message)) => {
                VisualsState::Idle { notice: Some(message) }
            }
            (state, _) => state,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, VisualsState::Generating { .. })
    }

    pub fn asset(&self) -> Option<&ImageAsset> {
        match self {
            VisualsState::Displaying { asset, .. } => Some(asset),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            VisualsState::Idle { notice } => notice.as_deref(),
            _ => None,
        }
    }

    /// JSON-friendly view with the image as a data URI
    pub fn view(&self) -> VisualsView {
        match self {
            VisualsState::Idle { .. } => VisualsView {
                phase: "idle",
                prompt: None,
                image: None,
                notice: self.notice().map(String::from),
            },
            VisualsState::Generating { prompt } => VisualsView {
                phase: "generating",
                prompt: Some(prompt.clone()),
                image: None,
                notice: None,
            },
            VisualsState::Displaying { prompt, asset } => VisualsView {
                phase: "displaying",
                prompt: Some(prompt.clone()),
                image: Some(asset.to_data_uri()),
                notice: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualsView {
    pub phase: &'static str,
    pub prompt: Option<String>,
    pub image: Option<String>,
    pub notice: Option<String>,
}

/// An image ready to be saved by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedAsset {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Visuals lab panel
#[derive(Clone)]
pub struct VisualsPanel {
    gateway: AiGateway,
    export_basename: String,
    state: Arc<RwLock<VisualsState>>,
    lifecycle: Arc<Lifecycle>,
}

impl VisualsPanel {
    pub fn new(gateway: AiGateway, config: &AppConfig) -> Self {
        Self {
            gateway,
            export_basename: config.visuals.export_basename.clone(),
            state: Arc::new(RwLock::new(VisualsState::default())),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub async fn snapshot(&self) -> VisualsState {
        self.state.read().await.clone()
    }

    /// Generate an image for `prompt` and wait for the outcome.
    ///
    /// Blank prompts and submissions during a running generation leave the
    /// state untouched and make no gateway call.
    pub async fn generate(&self, prompt: &str) -> VisualsState {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            debug!("Ignoring empty visuals prompt");
            return self.snapshot().await;
        }

        let mut token = self.lifecycle.current();
        {
            let mut state = self.state.write().await;
            if !token.is_live() || state.is_generating() {
                return state.clone();
            }
            *state = std::mem::take(&mut *state).apply(VisualsEvent::Submitted(prompt.to_string()));
        }

        let Some(result) = token.run(self.gateway.generate_asset(prompt)).await else {
            debug!("Visuals panel unmounted during generation");
            return self.snapshot().await;
        };

        let event = match result {
            Ok(Some(asset)) => {
                info!("Generated {} asset ({} bytes)", asset.mime_type, asset.bytes.len());
                VisualsEvent::Generated(Some(asset))
            }
            Ok(None) => {
                warn!("Asset generation returned no image");
                VisualsEvent::Generated(None)
            }
            Err(e) => {
                warn!("Asset generation failed: {}", e);
                VisualsEvent::Failed(format!("Generation failed: {}", e))
            }
        };
        self.apply(&token, event).await;
        self.snapshot().await
    }

    /// The currently displayed image, named for download
    pub async fn export(&self) -> Option<ExportedAsset> {
        let state = self.state.read().await;
        state.asset().map(|asset| ExportedAsset {
            file_name: format!("{}.{}", self.export_basename, asset.extension()),
            mime_type: asset.mime_type.clone(),
            bytes: asset.bytes.clone(),
        })
    }

    async fn apply(&self, token: &MountToken, event: VisualsEvent) {
        let mut state = self.state.write().await;
        if token.is_live() {
            *state = std::mem::take(&mut *state).apply(event);
        }
    }
}

#[async_trait]
impl Panel for VisualsPanel {
    fn section(&self) -> AppSection {
        AppSection::AssetGen
    }

    async fn mount(&self) {
        self.lifecycle.mount();
        *self.state.write().await = VisualsState::default();
    }

    async fn unmount(&self) {
        self.lifecycle.unmount();
        *self.state.write().await = VisualsState::default();
    }
}
