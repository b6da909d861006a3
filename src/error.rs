//! Error taxonomy, grouped by severity as `spec.md` §7 orders them.
//!
//! Only the `ClientFacing` group is ever returned to an HTTP caller.
//! `Recoverable` conditions never become an `AgentError` at all — they are
//! represented as [`crate::shdr::ParseOutcome::Skipped`] so the ingest path
//! has no error variant to accidentally propagate.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::models::query::MTConnectError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("schema validation failed for device: {0}")]
    SchemaValidation(String),

    #[error("failed to bind HTTP listener: {0}")]
    PortBind(#[source] std::io::Error),

    #[error("OUT_OF_RANGE: from={from} is outside [{first_sequence}, {next_sequence}]")]
    OutOfRange {
        from: u64,
        first_sequence: u64,
        next_sequence: u64,
    },

    #[error("INVALID_XPATH: {0}")]
    InvalidXPath(String),

    #[error("UNSUPPORTED: {0}")]
    UnsupportedVerb(String),

    #[error("adapter connection error: {0}")]
    AdapterConnection(#[source] std::io::Error),
}

impl AgentError {
    fn error_code(&self) -> &'static str {
        match self {
            AgentError::OutOfRange { .. } => "OUT_OF_RANGE",
            AgentError::InvalidXPath(_) => "INVALID_XPATH",
            AgentError::UnsupportedVerb(_) => "UNSUPPORTED",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<crate::store::HistoryError> for AgentError {
    fn from(e: crate::store::HistoryError) -> Self {
        let crate::store::HistoryError::OutOfRange { from, first_sequence, next_sequence } = e;
        AgentError::OutOfRange { from, first_sequence, next_sequence }
    }
}

/// Only the client-facing group reaches `IntoResponse`; the other variants
/// are handled (logged, retried, or fatal-exit) before they ever cross an
/// HTTP boundary.
impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let body = MTConnectError::new(self.error_code(), self.to_string());
        let xml = crate::query::xml::serialize_error(&body);
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "application/xml")],
            xml,
        )
            .into_response()
    }
}
