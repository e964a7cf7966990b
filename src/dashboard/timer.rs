use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::controller::{Dashboard, RefreshMode, RefreshOutcome};
use crate::api::Pagination;
use crate::error::ApiError;

/// Dashboard shared between the host and the refresh timer.
pub type SharedDashboard = Arc<Mutex<Dashboard>>;

/// Run one refresh cycle on a shared dashboard. The lock is held only to
/// claim the refresh slot and to apply the result, never across the request,
/// so a second refresh started meanwhile sees `Busy`.
pub async fn refresh_shared(dashboard: &Mutex<Dashboard>, mode: RefreshMode) -> RefreshOutcome {
    let backend = {
        let mut dash = dashboard.lock().await;
        if !dash.begin_refresh(mode) {
            return RefreshOutcome::Busy;
        }
        dash.backend()
    };
    let outcome = backend.update_data().await;
    dashboard.lock().await.finish_refresh(mode, outcome)
}

/// Load a record page on a shared dashboard without holding the lock across
/// the request.
pub async fn load_page_shared(dashboard: &Mutex<Dashboard>, page: u32) -> Result<Pagination, ApiError> {
    let backend = dashboard.lock().await.backend();
    let result = backend.view_data(page.max(1)).await;
    dashboard.lock().await.finish_load(result)
}

/// Periodic silent refresh. The task is aborted on [`RefreshTimer::stop`] or
/// when the timer is dropped, so no refresh fires after teardown.
pub struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Spawn the timer task. The first refresh happens one `period` from now.
    pub fn start(dashboard: SharedDashboard, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                refresh_shared(&dashboard, RefreshMode::Silent).await;
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
