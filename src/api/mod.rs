use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::report::Reporter;
use crate::store::Database;

pub mod handlers;

/// Shared state passed to handlers.
pub struct AppState {
    pub reporter: Arc<Reporter>,
    /// Hours-back window used when a request names none.
    pub default_hours: i64,
    /// Checked by `/readyz`; empty when reports come from another source.
    pub databases: Vec<Arc<Database>>,
}

/// Report API routes, relative to `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", get(handlers::list_reports))
        .route("/reports/:name", get(handlers::get_report))
        .route("/refresh", post(handlers::refresh))
        .fallback(fallback_404)
}

/// The full HTTP app: health checks, metrics and the report API.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
