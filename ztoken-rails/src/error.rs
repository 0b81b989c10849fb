//! Error types for the HTTP rail.

use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;
use ztoken_ledger::LedgerError;

#[derive(Error, Debug)]
pub enum RailError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Malformed signature encoding.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Dispatch nonce not above the sender's last accepted nonce.
    #[error("nonce {got} already used (last accepted {last})")]
    ReplayedNonce { last: u64, got: u64 },
}

impl RailError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            RailError::Ledger(err) => err.error_code(),
            RailError::InvalidSignature(_) => "INVALID_SIGNATURE",
            RailError::ReplayedNonce { .. } => "REPLAYED_NONCE",
        }
    }

    /// Get HTTP status code suggestion.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            RailError::Ledger(err) => err.suggested_status_code(),
            RailError::InvalidSignature(_) => 400,
            RailError::ReplayedNonce { .. } => 409,
        }
    }
}

/// JSON error response: `{ "error": .., "error_code": .. }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "error_code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<RailError> for ApiError {
    fn from(err: RailError) -> Self {
        let status = StatusCode::from_u16(err.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {err}");
        } else {
            tracing::debug!("request rejected: {err}");
        }
        ApiError {
            status,
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        RailError::from(err).into()
    }
}
