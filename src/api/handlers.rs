use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::errors::{AppError, ReportStatus};
use crate::metrics;
use crate::models::{Report, TimeWindow};
use crate::report::{CatalogEntry, ReportKind};

/// Window query parameters: `start` and `end`, or `hours`. Empty values
/// count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub hours: Option<String>,
}

impl WindowParams {
    pub fn into_window(self, default_hours: i64) -> Result<TimeWindow, AppError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let start = present(self.start);
        let end = present(self.end);
        let hours = present(self.hours)
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|_| {
                    AppError::BadRequest(format!("hours must be an integer, got '{}'", raw))
                })
            })
            .transpose()?;

        TimeWindow::from_params(start.as_deref(), end.as_deref(), hours, default_hours)
            .map_err(AppError::BadRequest)
    }
}

pub fn status_code(status: ReportStatus) -> StatusCode {
    match status {
        ReportStatus::Ok | ReportStatus::Empty => StatusCode::OK,
        ReportStatus::InvalidWindow => StatusCode::BAD_REQUEST,
        ReportStatus::ConnectionError => StatusCode::SERVICE_UNAVAILABLE,
        ReportStatus::QueryError => StatusCode::BAD_GATEWAY,
    }
}

/// GET /api/v1/reports — the served part of the catalog
pub async fn list_reports(State(state): State<Arc<AppState>>) -> Json<Vec<CatalogEntry>> {
    Json(
        state
            .reporter
            .kinds()
            .into_iter()
            .map(CatalogEntry::from)
            .collect(),
    )
}

/// GET /api/v1/reports/:name — one report over `?start=&end=` or `?hours=`
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let kind = name
        .parse::<ReportKind>()
        .ok()
        .filter(|kind| state.reporter.serves(*kind))
        .ok_or_else(|| AppError::ReportNotFound(name.clone()))?;
    let window = params.into_window(state.default_hours)?;

    let report = state.reporter.report(kind, &window).await;
    Ok((status_code(report.status), Json(report)))
}

/// POST /api/v1/refresh — manual refresh trigger
pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let invalidated = state.reporter.refresh();
    (StatusCode::ACCEPTED, Json(json!({ "invalidated": invalidated })))
}

/// GET /metrics — Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

/// GET /readyz — round trip to every configured database
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    for db in &state.databases {
        if !db.health_check().await {
            tracing::warn!(dialect = ?db.dialect(), "readiness check failed: database unreachable");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
        }
    }
    (StatusCode::OK, "ok")
}
