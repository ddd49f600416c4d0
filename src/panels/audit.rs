// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! R&D security audit: simulated upload followed by a sensitivity verdict
//!
//! Each upload is queued at 10% progress, stepped through the configured
//! progress points with a fixed delay, then scored by the gateway. Items are
//! never removed; the newest item is first.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AppSection, Panel};
use crate::config::{AuditConfig, FallbackPolicy};
use crate::gateway::{AiGateway, AuditStatus, SensitivityAssessment};
use crate::lifecycle::{Lifecycle, MountToken};
use crate::AppConfig;

/// Progress recorded when an item is first queued
pub const INITIAL_PROGRESS: u8 = 10;

/// Final outcome of an audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Flagged,
}

impl Verdict {
    /// Settle an assessment; an undecided `processing` status is resolved
    /// by comparing the score with `flag_threshold`
    pub fn settle(assessment: &SensitivityAssessment, flag_threshold: f64) -> Self {
        match assessment.status {
            AuditStatus::Safe => Verdict::Safe,
            AuditStatus::Flagged => Verdict::Flagged,
            AuditStatus::Processing if assessment.score >= flag_threshold => Verdict::Flagged,
            AuditStatus::Processing => Verdict::Safe,
        }
    }

    pub fn status(&self) -> AuditStatus {
        match self {
            Verdict::Safe => AuditStatus::Safe,
            Verdict::Flagged => AuditStatus::Flagged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuditStage {
    Processing { progress: u8 },
    Complete { verdict: Verdict, score: f64 },
}

/// A queued video
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "VideoRecord")]
pub struct VideoMetadata {
    pub id: String,
    pub name: String,
    pub size: String,
    pub uploaded_at: DateTime<Local>,
    pub stage: AuditStage,
}

impl VideoMetadata {
    pub fn new(name: &str, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            size: size_label(size_bytes),
            uploaded_at: Local::now(),
            stage: AuditStage::Processing { progress: INITIAL_PROGRESS },
        }
    }

    pub fn status(&self) -> AuditStatus {
        match self.stage {
            AuditStage::Processing { .. } => AuditStatus::Processing,
            AuditStage::Complete { verdict, .. } => verdict.status(),
        }
    }

    pub fn progress(&self) -> u8 {
        match self.stage {
            AuditStage::Processing { progress } => progress,
            AuditStage::Complete { .. } => 100,
        }
    }

    /// Only present once the audit is complete
    pub fn sensitivity_score(&self) -> Option<f64> {
        match self.stage {
            AuditStage::Processing { .. } => None,
            AuditStage::Complete { score, .. } => Some(score),
        }
    }
}

/// Flat wire shape of a queued video
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub name: String,
    pub size: String,
    pub status: AuditStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity_score: Option<f64>,
    pub uploaded_at: String,
}

impl From<VideoMetadata> for VideoRecord {
    fn from(video: VideoMetadata) -> Self {
        Self {
            status: video.status(),
            progress: video.progress(),
            sensitivity_score: video.sensitivity_score(),
            uploaded_at: video.uploaded_at.format("%-I:%M:%S %p").to_string(),
            id: video.id,
            name: video.name,
            size: video.size,
        }
    }
}

/// Human size label, e.g. `5.00 MB`
pub fn size_label(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[derive(Debug, Clone)]
pub enum AuditEvent {
    Enqueued(VideoMetadata),
    Progressed { id: String, progress: u8 },
    Finalized { id: String, verdict: Verdict, score: f64 },
}

/// Newest-first audit queue
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AuditQueue {
    entries: Vec<VideoMetadata>,
}

impl AuditQueue {
    pub fn entries(&self) -> &[VideoMetadata] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&VideoMetadata> {
        self.entries.iter().find(|v| v.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.entries.iter().filter(|v| v.status() == AuditStatus::Processing).count()
    }

    pub fn apply(mut self, event: AuditEvent) -> Self {
        match event {
            AuditEvent::Enqueued(video) => {
                if self.get(&video.id).is_none() {
                    self.entries.insert(0, video);
                }
            }
            AuditEvent::Progressed { id, progress } => {
                if let Some(video) = self.entries.iter_mut().find(|v| v.id == id) {
                    // progress only moves forward and never reaches 100 here
                    if let AuditStage::Processing { progress: current } = video.stage {
                        if progress > current && progress < 100 {
                            video.stage = AuditStage::Processing { progress };
                        }
                    }
                }
            }
            AuditEvent::Finalized { id, verdict, score } => {
                if let Some(video) = self.entries.iter_mut().find(|v| v.id == id) {
                    if matches!(video.stage, AuditStage::Processing { .. }) {
                        video.stage = AuditStage::Complete { verdict, score };
                    }
                }
            }
        }
        self
    }
}

/// A running upload
pub struct UploadHandle {
    pub id: String,
    pub task: JoinHandle<()>,
}

/// R&D security panel
#[derive(Clone)]
pub struct AuditPanel {
    gateway: AiGateway,
    config: AuditConfig,
    queue: Arc<RwLock<AuditQueue>>,
    lifecycle: Arc<Lifecycle>,
}

impl AuditPanel {
    pub fn new(gateway: AiGateway, config: &AppConfig) -> Self {
        Self {
            gateway,
            config: config.audit.clone(),
            queue: Arc::new(RwLock::new(AuditQueue::default())),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub async fn snapshot(&self) -> AuditQueue {
        self.queue.read().await.clone()
    }

    /// Queue a file and start its audit in the background
    pub async fn upload(&self, name: &str, size_bytes: u64) -> UploadHandle {
        let token = self.lifecycle.current();
        let video = VideoMetadata::new(name, size_bytes);
        let id = video.id.clone();

        info!("Queued {:?} ({}) as {}", video.name, video.size, id);
        self.apply(&token, AuditEvent::Enqueued(video)).await;

        let panel = self.clone();
        let name = name.to_string();
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            panel.audit(token, task_id, name).await;
        });

        UploadHandle { id, task }
    }

    async fn audit(&self, mut token: MountToken, id: String, name: String) {
        for &progress in &self.config.progress_steps {
            if token.run(tokio::time::sleep(self.config.step_delay())).await.is_none() {
                debug!("Audit of {} abandoned during upload", id);
                return;
            }
            self.apply(&token, AuditEvent::Progressed { id: id.clone(), progress }).await;
        }

        let Some(result) = token.run(self.gateway.assess_sensitivity(&name, &self.config.context)).await else {
            debug!("Audit of {} abandoned during assessment", id);
            return;
        };

        let assessment = match result {
            Ok(assessment) => assessment,
            Err(e) => {
                let fallback = match self.config.fallback {
                    FallbackPolicy::FailOpen => SensitivityAssessment::fail_open(),
                    FallbackPolicy::FailClosed => SensitivityAssessment::fail_closed(),
                };
                warn!("Sensitivity audit of {:?} failed ({}), recording {:?}", name, e, fallback);
                fallback
            }
        };

        let verdict = Verdict::settle(&assessment, self.config.flag_threshold);
        info!("Audit of {:?} complete: {:?} (score {:.1})", name, verdict, assessment.score);
        self.apply(&token, AuditEvent::Finalized { id, verdict, score: assessment.score }).await;
    }

    async fn apply(&self, token: &MountToken, event: AuditEvent) {
        let mut queue = self.queue.write().await;
        if token.is_live() {
            *queue = std::mem::take(&mut *queue).apply(event);
        }
    }
}

#[async_trait]
impl Panel for AuditPanel {
    fn section(&self) -> AppSection {
        AppSection::RdPipeline
    }

    async fn mount(&self) {
        self.lifecycle.mount();
        *self.queue.write().await = AuditQueue::default();
    }

    async fn unmount(&self) {
        self.lifecycle.unmount();
        *self.queue.write().await = AuditQueue::default();
    }
}
