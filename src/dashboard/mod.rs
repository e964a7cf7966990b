//! Dashboard controller.
//!
//! Keeps the agricultural records received from the backend, the charts built
//! from them, transient notifications, the metric detail view and the
//! periodic silent refresh.

pub mod charts;
pub mod controller;
pub mod metrics;
pub mod notifications;
pub mod templates;
pub mod timer;

pub use charts::{BarChart, ChartHandle, ChartRegistry, ChartSeries};
pub use controller::{Dashboard, DashboardOptions, DashboardSnapshot, RefreshMode, RefreshOutcome};
pub use metrics::{MetricCard, MetricDetail, Recommendation};
pub use notifications::{Notification, NotificationCenter, Severity};
pub use timer::{load_page_shared, refresh_shared, RefreshTimer, SharedDashboard};
