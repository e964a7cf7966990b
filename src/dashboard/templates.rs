use askama::Template;

use super::metrics::MetricDetail;
use super::notifications::Notification;

// ── Askama Templates ─────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "metric_modal.html")]
pub struct MetricModalTemplate<'a> {
    pub metric_id: &'a str,
    pub label: &'a str,
    pub value: &'a str,
    pub unit: &'a str,
    pub trend: &'a str,
    pub recommendation: &'a str,
}

#[derive(Template)]
#[template(path = "notification.html")]
pub struct NotificationTemplate<'a> {
    pub id: u64,
    pub severity: &'a str,
    pub message: &'a str,
}

// ── Render helpers (called from controller.rs) ───────────────────────

pub fn render_metric_modal(detail: &MetricDetail) -> String {
    let template = MetricModalTemplate {
        metric_id: &detail.metric.id,
        label: &detail.metric.label,
        value: &detail.metric.value,
        unit: &detail.metric.unit,
        trend: detail.trend,
        recommendation: detail.recommendation,
    };
    template.render().unwrap_or_default()
}

pub fn render_notification(notification: &Notification) -> String {
    let template = NotificationTemplate {
        id: notification.id,
        severity: notification.severity.as_str(),
        message: &notification.message,
    };
    template.render().unwrap_or_default()
}
