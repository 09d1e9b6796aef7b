// =============================================================================
// Tracker Errors
// =============================================================================
//
// Every failure is local to one symbol; nothing here is fatal to the store.
// `QuoteFetch` only ever exists inside a background recomputation task, where
// it is logged and dropped.
// =============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The ticker is already registered.
    #[error("the stock with ticker {0} is already tracked")]
    AlreadyTracked(String),

    /// The ticker is not registered.
    #[error("the stock with ticker {0} was not found")]
    NotTracked(String),

    /// The analysis engine was handed an empty bar sequence.
    #[error("insufficient data: at least one price bar is required")]
    InsufficientData,

    /// The quote provider failed or timed out.
    #[error("quote history unavailable for {ticker}: {reason}")]
    QuoteFetch { ticker: String, reason: String },

    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("invalid tolerance {0}: must be a finite, non-negative number")]
    InvalidTolerance(f64),

    /// A request body that could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyTracked(_) => StatusCode::CONFLICT,
            Self::NotTracked(_) => StatusCode::NOT_FOUND,
            Self::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
            Self::QuoteFetch { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidTicker(_) | Self::InvalidTolerance(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (self.status_code(), axum::Json(body)).into_response()
    }
}
