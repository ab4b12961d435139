//! Background job: periodic report refresh.
//!
//! Each tick compacts expired cache entries, then recomputes every served
//! report over the default hours-back window so readers hit a warm cache.
//! Entries for other windows keep their own TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::models::{Report, TimeWindow};
use crate::report::Reporter;

/// Spawn the refresh task. The first cycle runs immediately.
pub fn spawn(reporter: Arc<Reporter>, period: Duration, default_hours: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_cycle(&reporter, default_hours).await;
        }
    })
}

/// One refresh cycle. Returns the recomputed reports in catalog order.
pub async fn run_cycle(reporter: &Reporter, default_hours: i64) -> Vec<Report> {
    let evicted = reporter.cache().evict_expired();
    tracing::debug!(evicted, "refresh cycle started");

    let window = TimeWindow::HoursBack(default_hours);
    let kinds = reporter.kinds();
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let report = reporter.refresh_report(kind, &window).await;
        if report.is_error() {
            tracing::warn!(
                report = kind.name(),
                status = ?report.status,
                "refresh failed: {}",
                report.message.as_deref().unwrap_or_default()
            );
        }
        reports.push(report);
    }

    let failed = reports.iter().filter(|r| r.is_error()).count();
    tracing::info!(reports = reports.len(), failed, "refresh cycle finished");
    reports
}
