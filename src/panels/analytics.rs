// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Thermal feedback analytics panel
//!
//! Runs the review corpus through the gateway once per mount, then merges the
//! model's topic labels with a synthesized daily history. Only the most recent
//! day reflects real output: it is the number of reviews mapped to the topic,
//! scaled by `mention_scale`.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AppSection, Panel};
use crate::config::AnalyticsConfig;
use crate::gateway::{AiGateway, TopicMapping};
use crate::lifecycle::{Lifecycle, MountToken};
use crate::AppConfig;

/// Fixed review corpus analysed on mount
pub const SOLE_REVIEWS: [&str; 10] = [
    "My feet felt icy cold even after a 5-mile run in the sun!",
    "The phase change material in the heel is a game changer for heat dissipation.",
    "Slightly bulky, but the active cooling is worth the extra weight.",
    "Sweat management is incredible, feet stay dry all day.",
    "The cooling effect faded after 4 hours of heavy hiking.",
    "Best investment for summer athletes. My soles feel like they are on ice.",
    "Material is a bit stiff near the arch, but the thermal performance is 10/10.",
    "I noticed a small hum from the active fan module in the left sole.",
    "Remarkable moisture wicking. No more swamp-foot during marathons.",
    "Could you make a version that fits better in narrow cycling shoes?",
];

/// Source of synthetic history counts
pub trait TrendSource: Send + Sync {
    fn history_count(&self, topic: &str, date: &str) -> u32;
}

/// Uniformly random counts in `5..25`
pub struct RandomTrend;

impl TrendSource for RandomTrend {
    fn history_count(&self, _topic: &str, _date: &str) -> u32 {
        rand::rng().random_range(5..25)
    }
}

/// The same count for every day
pub struct FixedTrend(pub u32);

impl TrendSource for FixedTrend {
    fn history_count(&self, _topic: &str, _date: &str) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u32,
}

/// Daily mention counts for one topic, oldest day first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTrend {
    pub topic: String,
    pub counts: Vec<DailyCount>,
}

impl TopicTrend {
    pub fn count_on(&self, date: &str) -> Option<u32> {
        self.counts.iter().find(|c| c.date == date).map(|c| c.count)
    }

    /// Count for the most recent day
    pub fn latest(&self) -> u32 {
        self.counts.last().map(|c| c.count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Table,
    #[default]
    Chart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AnalyticsPhase {
    #[default]
    Idle,
    Loading,
    Ready { trends: Vec<TopicTrend> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct AnalyticsState {
    pub phase: AnalyticsPhase,
    pub view: ViewMode,
}

#[derive(Debug, Clone)]
pub enum AnalyticsEvent {
    Started,
    Completed(Vec<TopicTrend>),
    Failed(String),
    ViewSelected(ViewMode),
}

impl AnalyticsState {
    pub fn apply(self, event: AnalyticsEvent) -> Self {
        match (self.phase, event) {
            (_, AnalyticsEvent::Started) => Self { phase: AnalyticsPhase::Loading, view: self.view },
            (AnalyticsPhase::Loading, AnalyticsEvent::Completed(trends)) => {
                Self { phase: AnalyticsPhase::Ready { trends }, view: self.view }
            }
            // failures surface as an empty result set
            (AnalyticsPhase::Loading, AnalyticsEvent::Failed(_)) => {
                Self { phase: AnalyticsPhase::Ready { trends: Vec::new() }, view: self.view }
            }
            (phase, AnalyticsEvent::ViewSelected(view)) => Self { phase, view },
            (phase, _) => Self { phase, view: self.view },
        }
    }

    pub fn trends(&self) -> &[TopicTrend] {
        match &self.phase {
            AnalyticsPhase::Ready { trends } => trends,
            _ => &[],
        }
    }

    /// One row per day with every topic's count, for the chart view
    pub fn chart_rows(&self) -> Vec<ChartRow> {
        let trends = self.trends();
        let Some(first) = trends.first() else {
            return Vec::new();
        };

        first
            .counts
            .iter()
            .map(|day| ChartRow {
                date: day.date.clone(),
                values: trends
                    .iter()
                    .map(|t| (t.topic.clone(), t.count_on(&day.date).unwrap_or(0)))
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow {
    pub date: String,
    pub values: Vec<(String, u32)>,
}

/// Labels for `days` consecutive days ending at `today`, e.g. `Oct 19`
pub fn date_labels(today: NaiveDate, days: u32) -> Vec<String> {
    (0..days)
        .rev()
        .map(|back| (today - chrono::Duration::days(i64::from(back))).format("%b %-d").to_string())
        .collect()
}

/// Topic names in first-seen order, without duplicates
pub fn distinct_topics(mappings: &[TopicMapping]) -> Vec<String> {
    let mut seen = HashSet::new();
    mappings
        .iter()
        .filter(|m| seen.insert(m.topic_name.as_str()))
        .map(|m| m.topic_name.clone())
        .collect()
}

/// Merge model topics with synthetic history
pub fn build_trends(
    mappings: &[TopicMapping],
    dates: &[String],
    source: &dyn TrendSource,
    mention_scale: u32,
) -> Vec<TopicTrend> {
    distinct_topics(mappings)
        .into_iter()
        .map(|topic| {
            let mentions = mappings.iter().filter(|m| m.topic_name == topic).count() as u32;
            let last = dates.len().saturating_sub(1);
            let counts = dates
                .iter()
                .enumerate()
                .map(|(i, date)| DailyCount {
                    date: date.clone(),
                    count: if i == last {
                        mentions.saturating_mul(mention_scale)
                    } else {
                        source.history_count(&topic, date)
                    },
                })
                .collect();
            TopicTrend { topic, counts }
        })
        .collect()
}

/// Thermal feedback panel
#[derive(Clone)]
pub struct AnalyticsPanel {
    gateway: AiGateway,
    source: Arc<dyn TrendSource>,
    reviews: Arc<Vec<String>>,
    config: AnalyticsConfig,
    state: Arc<RwLock<AnalyticsState>>,
    lifecycle: Arc<Lifecycle>,
}

impl AnalyticsPanel {
    pub fn new(gateway: AiGateway, config: &AppConfig) -> Self {
        Self::with_source(gateway, config, Arc::new(RandomTrend))
    }

    pub fn with_source(gateway: AiGateway, config: &AppConfig, source: Arc<dyn TrendSource>) -> Self {
        Self {
            gateway,
            source,
            reviews: Arc::new(SOLE_REVIEWS.iter().map(|r| r.to_string()).collect()),
            config: config.analytics.clone(),
            state: Arc::new(RwLock::new(AnalyticsState::default())),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    /// Replace the review corpus
    pub fn with_reviews(mut self, reviews: Vec<String>) -> Self {
        self.reviews = Arc::new(reviews);
        self
    }

    pub fn reviews(&self) -> &[String] {
        &self.reviews
    }

    pub async fn snapshot(&self) -> AnalyticsState {
        self.state.read().await.clone()
    }

    /// Switch between table and chart; never refetches
    pub async fn select_view(&self, view: ViewMode) {
        let mut state = self.state.write().await;
        *state = std::mem::take(&mut *state).apply(AnalyticsEvent::ViewSelected(view));
    }

    /// Run the analysis under the current mount and wait for it
    pub async fn refresh(&self) -> AnalyticsState {
        self.analyze(self.lifecycle.current(), Local::now().date_naive()).await;
        self.snapshot().await
    }

    async fn analyze(&self, mut token: MountToken, today: NaiveDate) {
        self.apply(&token, AnalyticsEvent::Started).await;

        let Some(result) = token.run(self.gateway.analyze_feedback(&self.reviews)).await else {
            debug!("Analytics panel unmounted during analysis");
            return;
        };

        let event = match result {
            Ok(mappings) => {
                let dates = date_labels(today, self.config.history_days);
                let trends = build_trends(&mappings, &dates, self.source.as_ref(), self.config.mention_scale);
                info!("Feedback analysis ready: {} topics", trends.len());
                AnalyticsEvent::Completed(trends)
            }
            Err(e) => {
                warn!("Feedback analysis failed, showing no trends: {}", e);
                AnalyticsEvent::Failed(e.to_string())
            }
        };
        self.apply(&token, event).await;
    }

    async fn apply(&self, token: &MountToken, event: AnalyticsEvent) {
        let mut state = self.state.write().await;
        if token.is_live() {
            *state = std::mem::take(&mut *state).apply(event);
        }
    }
}

#[async_trait]
impl Panel for AnalyticsPanel {
    fn section(&self) -> AppSection {
        AppSection::ThermalAnalytics
    }

    async fn mount(&self) {
        let token = self.lifecycle.mount();
        *self.state.write().await = AnalyticsState::default();
        let panel = self.clone();
        tokio::spawn(async move {
            panel.analyze(token, Local::now().date_naive()).await;
        });
    }

    async fn unmount(&self) {
        self.lifecycle.unmount();
        *self.state.write().await = AnalyticsState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{gateway_with, ScriptedModel};
    use crate::AiError;

    fn mapping(index: usize, topic: &str) -> TopicMapping {
        TopicMapping { review_index: index, topic_name: topic.to_string() }
    }

    #[test]
    fn test_date_labels_end_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let labels = date_labels(today, 15);
        assert_eq!(labels.len(), 15);
        assert_eq!(labels.first().unwrap(), "Feb 17");
        assert_eq!(labels.last().unwrap(), "Mar 2");
    }

    #[test]
    fn test_distinct_topics_are_stable_and_unique() {
        let mappings = vec![
            mapping(0, "Cooling"),
            mapping(1, "Comfort"),
            mapping(2, "Cooling"),
            mapping(3, "Fit"),
            mapping(4, "Comfort"),
        ];
        assert_eq!(distinct_topics(&mappings), vec!["Cooling", "Comfort", "Fit"]);
    }

    #[test]
    fn test_build_trends_scales_latest_day() {
        let dates = vec!["Mar 1".to_string(), "Mar 2".to_string(), "Mar 3".to_string()];
        let mappings = vec![mapping(0, "Cooling"), mapping(1, "Fit"), mapping(2, "Cooling")];

        let trends = build_trends(&mappings, &dates, &FixedTrend(7), 10);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].count_on("Mar 1"), Some(7));
        assert_eq!(trends[0].latest(), 20);
        assert_eq!(trends[1].latest(), 10);
    }

    #[test]
    fn test_huge_mention_scale_saturates() {
        let dates = vec!["Mar 1".to_string(), "Mar 2".to_string()];
        let mappings = vec![mapping(0, "Cooling"), mapping(1, "Cooling")];

        let trends = build_trends(&mappings, &dates, &FixedTrend(7), u32::MAX);
        assert_eq!(trends[0].latest(), u32::MAX);
        assert_eq!(trends[0].count_on("Mar 1"), Some(7));
    }

    #[test]
    fn test_random_trend_stays_in_range() {
        for _ in 0..200 {
            let count = RandomTrend.history_count("Cooling", "Mar 1");
            assert!((5..25).contains(&count));
        }
    }

    #[test]
    fn test_failure_yields_ready_with_no_trends() {
        let state = AnalyticsState::default()
            .apply(AnalyticsEvent::Started)
            .apply(AnalyticsEvent::Failed("quota".to_string()));
        assert_eq!(state.phase, AnalyticsPhase::Ready { trends: Vec::new() });
    }

    #[test]
    fn test_view_toggle_keeps_data() {
        let trends = vec![TopicTrend {
            topic: "Cooling".to_string(),
            counts: vec![DailyCount { date: "Mar 1".to_string(), count: 3 }],
        }];
        let state = AnalyticsState::default()
            .apply(AnalyticsEvent::Started)
            .apply(AnalyticsEvent::Completed(trends.clone()))
            .apply(AnalyticsEvent::ViewSelected(ViewMode::Table));

        assert_eq!(state.view, ViewMode::Table);
        assert_eq!(state.trends(), trends.as_slice());
        assert_eq!(state.chart_rows()[0].values, vec![("Cooling".to_string(), 3)]);
    }

    #[test]
    fn test_completion_outside_loading_is_ignored() {
        let state = AnalyticsState::default().apply(AnalyticsEvent::Completed(Vec::new()));
        assert_eq!(state.phase, AnalyticsPhase::Idle);
    }

    #[tokio::test]
    async fn test_cooling_scenario() {
        let model = Arc::new(ScriptedModel::new().reply_json(serde_json::json!({
            "mappings": [
                { "reviewIndex": 0, "topicName": "Cooling" },
                { "reviewIndex": 1, "topicName": "Cooling" }
            ]
        })));
        let panel = AnalyticsPanel::with_source(gateway_with(model.clone()), &AppConfig::default(), Arc::new(FixedTrend(9)));
        assert_eq!(panel.reviews().len(), 10);

        let state = panel.refresh().await;
        let trends = state.trends();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].topic, "Cooling");
        assert_eq!(trends[0].counts.len(), 15);
        assert_eq!(trends[0].latest(), 20);
        assert_eq!(trends[0].counts[0].count, 9);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_view_toggle_does_not_refetch() {
        let model = Arc::new(ScriptedModel::new().reply_json(serde_json::json!({ "mappings": [] })));
        let panel = AnalyticsPanel::with_source(gateway_with(model.clone()), &AppConfig::default(), Arc::new(FixedTrend(1)));

        panel.refresh().await;
        panel.select_view(ViewMode::Table).await;
        panel.select_view(ViewMode::Chart).await;

        assert_eq!(model.call_count(), 1);
        assert_eq!(panel.snapshot().await.view, ViewMode::Chart);
    }

    #[tokio::test]
    async fn test_gateway_error_is_empty_result() {
        let model = Arc::new(ScriptedModel::new().reply(Err(AiError::SchemaMismatch("bad".to_string()))));
        let panel = AnalyticsPanel::new(gateway_with(model), &AppConfig::default());

        let state = panel.refresh().await;
        assert_eq!(state.phase, AnalyticsPhase::Ready { trends: Vec::new() });
    }

    #[tokio::test]
    async fn test_mount_runs_analysis_once() {
        let model = Arc::new(ScriptedModel::new().reply_json(serde_json::json!({
            "mappings": [{ "reviewIndex": 3, "topicName": "Sweat Management" }]
        })));
        let panel = AnalyticsPanel::with_source(gateway_with(model.clone()), &AppConfig::default(), Arc::new(FixedTrend(5)));

        panel.mount().await;
        for _ in 0..100 {
            if matches!(panel.snapshot().await.phase, AnalyticsPhase::Ready { .. }) {
                break;
            }
            tokio::task::yield_now().await;
        }

        let state = panel.snapshot().await;
        assert_eq!(state.trends()[0].topic, "Sweat Management");
        assert_eq!(model.call_count(), 1);
    }
}
