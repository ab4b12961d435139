use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Failures of a single reporting cycle.
///
/// Variants carry the internal detail for logs. Consumers of a report only
/// ever see [`ReportError::user_message`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),
}

/// Outcome classification attached to every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Empty,
    InvalidWindow,
    ConnectionError,
    QueryError,
}

impl ReportStatus {
    pub fn is_error(self) -> bool {
        !matches!(self, ReportStatus::Ok | ReportStatus::Empty)
    }
}

impl ReportError {
    pub fn status(&self) -> ReportStatus {
        match self {
            ReportError::InvalidWindow(_) => ReportStatus::InvalidWindow,
            ReportError::Connection(_) => ReportStatus::ConnectionError,
            ReportError::Query(_) => ReportStatus::QueryError,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::InvalidWindow(_) => "invalid_window",
            ReportError::Connection(_) => "connection",
            ReportError::Query(_) => "query",
        }
    }

    /// Message safe to show to a dashboard user. Driver errors are not
    /// included; window errors are, since they describe the caller's input.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::InvalidWindow(reason) => format!("Invalid time window: {}", reason),
            ReportError::Connection(_) => {
                "Could not reach the reporting database. Try refreshing in a moment.".to_string()
            }
            ReportError::Query(_) => {
                "The reporting database could not run the report query.".to_string()
            }
        }
    }
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => ReportError::Connection(err.to_string()),
            other => ReportError::Query(other.to_string()),
        }
    }
}

/// Errors of the HTTP surface that happen before a report is produced.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::ReportNotFound(name) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "report_not_found",
                format!("no report named '{}'", name),
            ),
            AppError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "bad_request",
                reason.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
