use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use metered::{ErrorCount, HitCount, ResponseTime, metered};
use ppe_monitor_client::models::{
    DashboardStats, MonthlySummary, PpeStatusSlice, RuleViolationCount,
};
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{Error, Result, context::Context};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub today_detections: u64,
    pub yesterday_detections: u64,
    #[serde(rename = "totalNG")]
    pub total_ng: u64,
    pub ppe_status: Vec<PpeStatusSlice>,
    pub rule_violations: Vec<RuleViolationCount>,
    pub monthly_summary: Vec<MonthlySummary>,
    pub updated_at: DateTime<Utc>,
}

impl StatsSnapshot {
    fn empty() -> Self {
        Self {
            today_detections: 0,
            yesterday_detections: 0,
            total_ng: 0,
            ppe_status: Vec::new(),
            rule_violations: Vec::new(),
            monthly_summary: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    fn apply_totals(&mut self, stats: &DashboardStats) {
        self.today_detections = stats.today_detections;
        self.yesterday_detections = stats.yesterday_detections;
        self.total_ng = stats.total_ng;
    }
}

/// Refreshes the dashboard summary. Each endpoint is merged on its own; one
/// that fails keeps its previous values.
pub struct StatsPoller {
    context: Arc<Context>,
    stats_interval: Duration,
    metrics: Arc<StatsPollerMetrics>,
}

#[metered(registry = StatsPollerMetrics, visibility = pub)]
impl StatsPoller {
    pub fn new(context: Arc<Context>, stats_interval: Duration) -> Self {
        let metrics = context.metrics.stats_poller.clone();
        Self {
            context,
            stats_interval,
            metrics,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(interval = ?self.stats_interval, "Starting Stats Poller");

        let mut interval = interval(self.stats_interval);

        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    async fn refresh(&self) {
        match self.refresh_stats().await {
            Ok(snapshot) => {
                debug!(
                    today = snapshot.today_detections,
                    total_ng = snapshot.total_ng,
                    "Dashboard stats refreshed"
                );
                *self
                    .context
                    .stats
                    .write()
                    .unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
            }
            Err(err) => warn!(err = ?err, "Failed to refresh dashboard stats"),
        }
    }

    #[measure([HitCount, ErrorCount, ResponseTime])]
    async fn refresh_stats(&self) -> Result<StatsSnapshot> {
        let client = &self.context.client;
        let (stats, ppe_status, rule_violations, monthly_summary) = tokio::join!(
            client.get_dashboard_stats(),
            client.get_ppe_status(),
            client.get_rule_violations(),
            client.get_monthly_summary(),
        );

        let mut snapshot = self
            .context
            .stats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(StatsSnapshot::empty);
        let mut answered = 0;

        if let Some(stats) = answered_ok("stats", stats) {
            snapshot.apply_totals(&stats);
            answered += 1;
        }
        if let Some(ppe_status) = answered_ok("ppe-status", ppe_status) {
            snapshot.ppe_status = ppe_status;
            answered += 1;
        }
        if let Some(rule_violations) = answered_ok("rule-violations", rule_violations) {
            snapshot.rule_violations = rule_violations;
            answered += 1;
        }
        if let Some(monthly_summary) = answered_ok("monthly-summary", monthly_summary) {
            snapshot.monthly_summary = monthly_summary;
            answered += 1;
        }

        if answered == 0 {
            return Err(Error::StatsUnavailable);
        }

        snapshot.updated_at = Utc::now();
        Ok(snapshot)
    }
}

fn answered_ok<T>(
    endpoint: &'static str,
    res: ppe_monitor_client::error::Result<T>,
) -> Option<T> {
    res.inspect_err(|err| warn!(endpoint, err = ?err, "Failed to fetch dashboard data"))
        .ok()
}
