use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::AggregateRow;
use super::window::ResolvedWindow;
use crate::errors::{ReportError, ReportStatus};

/// A successfully computed summary, as held by the result cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub window: ResolvedWindow,
    pub rows: Vec<AggregateRow>,
    pub computed_at: DateTime<Utc>,
}

/// What a reporting call hands to the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub report: String,
    pub window: Option<ResolvedWindow>,
    pub status: ReportStatus,
    pub message: Option<String>,
    pub cached: bool,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<AggregateRow>,
}

impl Report {
    pub fn from_snapshot(report: &str, snapshot: Snapshot, cached: bool) -> Self {
        let (status, message) = if snapshot.rows.is_empty() {
            (
                ReportStatus::Empty,
                Some("No data for the selected window.".to_string()),
            )
        } else {
            (ReportStatus::Ok, None)
        };
        Self {
            report: report.to_string(),
            window: Some(snapshot.window),
            status,
            message,
            cached,
            generated_at: snapshot.computed_at,
            rows: snapshot.rows,
        }
    }

    /// Empty report carrying the user-facing message for `err`.
    pub fn failed(report: &str, window: Option<ResolvedWindow>, err: &ReportError) -> Self {
        Self {
            report: report.to_string(),
            window,
            status: err.status(),
            message: Some(err.user_message()),
            cached: false,
            generated_at: Utc::now(),
            rows: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}
