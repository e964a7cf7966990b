use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::charts::{price_series, production_series, BarChart, ChartRegistry, ChartSeries};
use super::metrics::{detail_for, summarize, MetricCard, MetricDetail, Recommendation};
use super::notifications::{Notification, NotificationCenter, Severity};
use super::templates::render_metric_modal;
use crate::api::{AgriRecord, DataBackend, DataPage, Pagination, UpdateResponse};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::logger::{Logger, SessionMetrics};
use crate::utils::write_json_export;

pub const REFRESH_SUCCESS_FALLBACK: &str = "Data updated successfully";
pub const REFRESH_FAILURE_FALLBACK: &str = "Failed to update data. Please try again.";
pub const NETWORK_FAILURE_MESSAGE: &str = "Network error while updating data. Please try again.";
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load data";

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub chart_width: usize,
    pub reload_delay: Duration,
    pub notification_ttl: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            chart_width: 40,
            reload_delay: Duration::from_millis(2000),
            notification_ttl: Duration::from_secs(5),
        }
    }
}

impl DashboardOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chart_width: config.chart_width,
            reload_delay: Duration::from_millis(config.reload_delay_ms),
            notification_ttl: Duration::from_secs(config.notification_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Background refresh from the timer: no progress indicator, no notifications.
    Silent,
    /// User-initiated: loading indicator, notifications, reload on success.
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Another refresh was already running.
    Busy,
    Updated {
        records: usize,
        reload_after: Option<Duration>,
    },
    Failed,
}

/// Export document for the whole dashboard.
#[derive(Serialize, Debug)]
pub struct DashboardSnapshot {
    pub exported_at: String,
    pub last_updated: Option<String>,
    pub metrics: Vec<MetricCard>,
    pub charts: Vec<ChartSeries>,
    pub recommendations: Vec<Recommendation>,
    pub records: Vec<AgriRecord>,
}

#[derive(Serialize)]
struct MetricExport {
    exported_at: String,
    #[serde(flatten)]
    detail: MetricDetail,
}

/// Dashboard state built from data received from the backend.
pub struct Dashboard {
    backend: Arc<dyn DataBackend>,
    logger: Option<Logger>,
    options: DashboardOptions,
    records: Vec<AgriRecord>,
    pagination: Option<Pagination>,
    last_updated: Option<String>,
    recommendations: Vec<Recommendation>,
    charts: ChartRegistry<BarChart>,
    notifications: NotificationCenter,
    refreshing: bool,
    loading: bool,
    metrics: SessionMetrics,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn DataBackend>, options: DashboardOptions, logger: Option<Logger>) -> Self {
        let notifications = NotificationCenter::new(options.notification_ttl);
        Self {
            backend,
            logger,
            options,
            records: Vec::new(),
            pagination: None,
            last_updated: None,
            recommendations: Vec::new(),
            charts: ChartRegistry::new(),
            notifications,
            refreshing: false,
            loading: false,
            metrics: SessionMetrics::new(),
        }
    }

    // ── Data loading ────────────────────────────────────────────────────

    /// Load one page of the record browser and make it the displayed data.
    pub async fn load_page(&mut self, page: u32) -> Result<Pagination, ApiError> {
        let result = self.backend.view_data(page.max(1)).await;
        self.finish_load(result)
    }

    /// Apply the result of `/api/data/view`. Failures keep the current page.
    pub fn finish_load(&mut self, result: Result<DataPage, ApiError>) -> Result<Pagination, ApiError> {
        match result {
            Ok(DataPage { data, pagination, .. }) => {
                self.apply(data, None);
                self.pagination = Some(pagination.clone());
                Ok(pagination)
            }
            Err(e) => {
                self.log_error(&format!("Record browser failed: {}", e));
                let message = e.server_message().unwrap_or(LOAD_FAILURE_MESSAGE).to_string();
                self.notify(message, Severity::Danger);
                Err(e)
            }
        }
    }

    /// Claim the refresh slot. Returns `false` if a refresh is already running.
    pub fn begin_refresh(&mut self, mode: RefreshMode) -> bool {
        if self.refreshing {
            return false;
        }
        self.refreshing = true;
        self.loading = mode == RefreshMode::Manual;
        true
    }

    /// Apply the result of `/api/update-data`. Failures leave the displayed
    /// data untouched.
    pub fn finish_refresh(
        &mut self,
        mode: RefreshMode,
        outcome: Result<UpdateResponse, ApiError>,
    ) -> RefreshOutcome {
        self.refreshing = false;
        self.loading = false;
        self.metrics.refreshes += 1;
        let silent = mode == RefreshMode::Silent;

        match outcome {
            Ok(update) => {
                let count = update.latest_data.len();
                let message = update
                    .message
                    .clone()
                    .unwrap_or_else(|| REFRESH_SUCCESS_FALLBACK.to_string());
                if let Some(logger) = &self.logger {
                    let _ = logger.log_refresh(silent, true, &message);
                }
                self.apply(update.latest_data, update.timestamp);

                if silent {
                    RefreshOutcome::Updated {
                        records: count,
                        reload_after: None,
                    }
                } else {
                    self.notify(message, Severity::Success);
                    RefreshOutcome::Updated {
                        records: count,
                        reload_after: Some(self.options.reload_delay),
                    }
                }
            }
            Err(e) => {
                self.metrics.refresh_failures += 1;
                if let Some(logger) = &self.logger {
                    let _ = logger.log_refresh(silent, false, &e.to_string());
                }
                if !silent {
                    let message = if e.is_transport() {
                        NETWORK_FAILURE_MESSAGE
                    } else {
                        e.server_message().unwrap_or(REFRESH_FAILURE_FALLBACK)
                    };
                    self.notify(message.to_string(), Severity::Danger);
                }
                RefreshOutcome::Failed
            }
        }
    }

    /// Run one refresh cycle against the backend.
    pub async fn refresh(&mut self, mode: RefreshMode) -> RefreshOutcome {
        if !self.begin_refresh(mode) {
            return RefreshOutcome::Busy;
        }
        let outcome = self.backend.update_data().await;
        self.finish_refresh(mode, outcome)
    }

    fn apply(&mut self, records: Vec<AgriRecord>, timestamp: Option<String>) {
        self.records = records;
        if timestamp.is_some() {
            self.last_updated = timestamp;
        }
        self.rebuild_charts();
    }

    fn rebuild_charts(&mut self) {
        let width = self.options.chart_width;
        for series in [production_series(&self.records), price_series(&self.records)] {
            let id = series.id.clone();
            self.charts.register(id, BarChart::new(series, width));
        }
    }

    /// Backend handle, for callers that await requests without holding
    /// the dashboard.
    pub fn backend(&self) -> Arc<dyn DataBackend> {
        self.backend.clone()
    }

    // ── Charts ──────────────────────────────────────────────────────────

    pub fn charts(&self) -> &ChartRegistry<BarChart> {
        &self.charts
    }

    pub fn charts_mut(&mut self) -> &mut ChartRegistry<BarChart> {
        &mut self.charts
    }

    /// Re-flow every chart for a new viewport width.
    pub fn on_resize(&mut self, width: usize) {
        self.options.chart_width = width;
        self.charts.resize_all(width);
    }

    // ── Metrics ─────────────────────────────────────────────────────────

    pub fn metric_cards(&self) -> Vec<MetricCard> {
        summarize(&self.records)
    }

    pub fn metric_detail(&self, id: &str) -> Option<MetricDetail> {
        self.metric_cards()
            .into_iter()
            .find(|m| m.id == id)
            .map(detail_for)
    }

    /// Modal markup for the metric card `id`.
    pub fn metric_modal(&self, id: &str) -> Option<String> {
        self.metric_detail(id).map(|d| render_metric_modal(&d))
    }

    pub fn export_metric(&self, id: &str, dir: &Path) -> Result<PathBuf> {
        let detail = self
            .metric_detail(id)
            .ok_or_else(|| anyhow!("Unknown metric '{}'", id))?;
        let export = MetricExport {
            exported_at: chrono::Local::now().to_rfc3339(),
            detail,
        };
        write_json_export(dir, &format!("metric_{}", id), &export)
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            exported_at: chrono::Local::now().to_rfc3339(),
            last_updated: self.last_updated.clone(),
            metrics: self.metric_cards(),
            charts: self.charts.iter().map(|(_, c)| c.series().clone()).collect(),
            recommendations: self.recommendations.clone(),
            records: self.records.clone(),
        }
    }

    pub fn export_snapshot(&self, dir: &Path) -> Result<PathBuf> {
        write_json_export(dir, "dashboard_export", &self.snapshot())
    }

    // ── Notifications ───────────────────────────────────────────────────

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        self.notifications.push(message, severity)
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    pub fn prune_notifications(&mut self) -> usize {
        self.notifications.prune(Instant::now())
    }

    pub fn notifications(&self) -> &[Notification] {
        self.notifications.active()
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn set_recommendations(&mut self, recommendations: Vec<Recommendation>) {
        self.recommendations = recommendations;
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn records(&self) -> &[AgriRecord] {
        &self.records
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Release every chart. Called when the host shuts down.
    pub fn teardown(&mut self) {
        self.charts.destroy_all();
    }

    fn log_error(&self, line: &str) {
        if let Some(logger) = &self.logger {
            let _ = logger.log_error(line);
        }
    }
}
