// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Dashboard panels and the navigation shell that mounts them

pub mod analytics;
pub mod audit;
pub mod extraction;
pub mod visuals;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::gateway::AiGateway;
use crate::AppConfig;

use analytics::AnalyticsPanel;
use audit::AuditPanel;
use extraction::ExtractionPanel;
use visuals::VisualsPanel;

/// Which panel the dashboard shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppSection {
    #[default]
    ThermalAnalytics,
    AssetGen,
    ExtractionAgent,
    RdPipeline,
}

impl AppSection {
    pub const ALL: [AppSection; 4] = [
        AppSection::ThermalAnalytics,
        AppSection::AssetGen,
        AppSection::ExtractionAgent,
        AppSection::RdPipeline,
    ];

    /// Heading shown above the panel
    pub fn title(&self) -> &'static str {
        match self {
            AppSection::ThermalAnalytics => "Thermal Analytics",
            AppSection::AssetGen => "AetherVisuals Lab",
            AppSection::ExtractionAgent => "Extraction Agent",
            AppSection::RdPipeline => "R&D Security",
        }
    }

    /// Path segment used by the web UI
    pub fn slug(&self) -> &'static str {
        match self {
            AppSection::ThermalAnalytics => "analytics",
            AppSection::AssetGen => "visuals",
            AppSection::ExtractionAgent => "extraction",
            AppSection::RdPipeline => "security",
        }
    }
}

impl FromStr for AppSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppSection::ALL
            .into_iter()
            .find(|section| section.slug() == s)
            .ok_or_else(|| format!("Unknown section: {}", s))
    }
}

/// A panel that can be shown and hidden by the shell
#[async_trait]
pub trait Panel: Send + Sync {
    /// Section this panel renders
    fn section(&self) -> AppSection;

    /// Called when the panel becomes visible. Starts from the initial state
    /// and cancels work started under an earlier mount.
    async fn mount(&self);

    /// Called when the panel is hidden. Cancels in-flight work and
    /// discards the panel's state.
    async fn unmount(&self);
}

/// All four panels plus the active section
pub struct Dashboard {
    pub analytics: AnalyticsPanel,
    pub visuals: VisualsPanel,
    pub extraction: ExtractionPanel,
    pub audit: AuditPanel,
    active: RwLock<AppSection>,
}

impl Dashboard {
    pub fn new(gateway: AiGateway, config: &AppConfig) -> Self {
        Self {
            analytics: AnalyticsPanel::new(gateway.clone(), config),
            visuals: VisualsPanel::new(gateway.clone(), config),
            extraction: ExtractionPanel::new(gateway.clone()),
            audit: AuditPanel::new(gateway, config),
            active: RwLock::new(AppSection::default()),
        }
    }

    /// Build from individually configured panels
    pub fn from_panels(
        analytics: AnalyticsPanel,
        visuals: VisualsPanel,
        extraction: ExtractionPanel,
        audit: AuditPanel,
    ) -> Self {
        Self {
            analytics,
            visuals,
            extraction,
            audit,
            active: RwLock::new(AppSection::default()),
        }
    }

    /// Mount the initially active panel
    pub async fn start(&self) {
        let section = *self.active.read().await;
        info!("Mounting {}", section.title());
        self.panel(section).mount().await;
    }

    pub async fn active(&self) -> AppSection {
        *self.active.read().await
    }

    /// Switch panels, unmounting the one being left. Returns `false` when
    /// `section` was already showing.
    pub async fn navigate(&self, section: AppSection) -> bool {
        let mut active = self.active.write().await;
        if *active == section {
            return false;
        }

        info!("Navigating {} -> {}", active.title(), section.title());
        self.panel(*active).unmount().await;
        *active = section;
        self.panel(section).mount().await;
        true
    }

    fn panel(&self, section: AppSection) -> &dyn Panel {
        match section {
            AppSection::ThermalAnalytics => &self.analytics,
            AppSection::AssetGen => &self.visuals,
            AppSection::ExtractionAgent => &self.extraction,
            AppSection::RdPipeline => &self.audit,
        }
    }
}

/// Convenience for sharing a dashboard between handlers
pub type SharedDashboard = Arc<Dashboard>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{gateway_with, ScriptedModel};
    use analytics::{AnalyticsPhase, FixedTrend};
    use tokio::sync::Notify;

    fn dashboard_with(model: Arc<ScriptedModel>, config: &AppConfig) -> Dashboard {
        let gateway = gateway_with(model);
        Dashboard::from_panels(
            AnalyticsPanel::with_source(gateway.clone(), config, Arc::new(FixedTrend(5))),
            VisualsPanel::new(gateway.clone(), config),
            ExtractionPanel::new(gateway.clone()),
            AuditPanel::new(gateway, config),
        )
    }

    #[test]
    fn test_section_slugs_round_trip() {
        for section in AppSection::ALL {
            assert_eq!(section.slug().parse::<AppSection>().unwrap(), section);
        }
        assert!("settings".parse::<AppSection>().is_err());
    }

    #[tokio::test]
    async fn test_navigation_discards_stale_analysis() {
        let gate = Arc::new(Notify::new());
        let model = Arc::new(
            ScriptedModel::gated(gate.clone()).reply_json(serde_json::json!({
                "mappings": [{ "reviewIndex": 0, "topicName": "Cooling" }]
            })),
        );
        let gateway = gateway_with(model.clone());
        let config = AppConfig::default();
        let dashboard = Dashboard::from_panels(
            AnalyticsPanel::with_source(gateway.clone(), &config, Arc::new(FixedTrend(5))),
            VisualsPanel::new(gateway.clone(), &config),
            ExtractionPanel::new(gateway.clone()),
            AuditPanel::new(gateway, &config),
        );

        dashboard.start().await;
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        dashboard.navigate(AppSection::AssetGen).await;
        gate.notify_one();
        tokio::task::yield_now().await;

        assert_eq!(dashboard.active().await, AppSection::AssetGen);
        assert_eq!(dashboard.analytics.snapshot().await.phase, AnalyticsPhase::Idle);
    }

    #[tokio::test]
    async fn test_mount_clears_generation_started_while_hidden() {
        let gate = Arc::new(Notify::new());
        let model = Arc::new(ScriptedModel::gated(gate.clone()).reply_text("no image"));
        let dashboard = Arc::new(dashboard_with(model.clone(), &AppConfig::default()));

        let pending = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.visuals.generate("glacier").await })
        };
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(dashboard.navigate(AppSection::AssetGen).await);
        pending.await.unwrap();
        assert_eq!(dashboard.visuals.snapshot().await, visuals::VisualsState::default());

        gate.notify_one();
        let retry = dashboard.visuals.generate("glacier").await;
        assert_eq!(model.call_count(), 2);
        assert!(!retry.is_generating());
    }

    #[tokio::test]
    async fn test_mount_never_leaves_audit_processing() {
        let model = Arc::new(ScriptedModel::new().reply_json(serde_json::json!({ "score": 3, "status": "safe" })));
        let mut config = AppConfig::default();
        config.audit.step_delay_ms = 50;
        let dashboard = dashboard_with(model, &config);

        let stale = dashboard.audit.upload("run.mp4", 1024).await;
        assert!(dashboard.navigate(AppSection::RdPipeline).await);
        stale.task.await.unwrap();
        assert_eq!(dashboard.audit.snapshot().await.in_flight(), 0);

        let fresh = dashboard.audit.upload("run.mp4", 1024).await;
        fresh.task.await.unwrap();
        let queue = dashboard.audit.snapshot().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].status(), crate::gateway::AuditStatus::Safe);
        assert_eq!(queue.entries()[0].progress(), 100);
    }

    #[tokio::test]
    async fn test_navigate_to_active_section_is_noop() {
        let dashboard = dashboard_with(Arc::new(ScriptedModel::new()), &AppConfig::default());
        assert!(!dashboard.navigate(AppSection::ThermalAnalytics).await);
    }
}
