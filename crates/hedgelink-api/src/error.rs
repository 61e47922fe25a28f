//! HTTP-facing error type.
//!
//! Every failure leaves the API as `{"detail": <string>}` with a status
//! matching the error kind; the CORS layer sits outside this mapping so
//! error responses carry CORS headers too. Auth failures never say which
//! check rejected.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use hedgelink_core::HedgeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Bad state for a transition, or an overlay invariant refusal.
    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Validation(String),

    /// An agent failed or was unreachable.
    #[error("{0}")]
    Upstream(String),

    #[error("agent call timed out")]
    Timeout,

    #[error("{0}")]
    FeatureDisabled(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Precondition(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<HedgeError> for ApiError {
    fn from(e: HedgeError) -> Self {
        match e {
            HedgeError::AccountNotFound(_) | HedgeError::VersusNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }

            HedgeError::VersusStatusMismatch { .. }
            | HedgeError::TicketCountMismatch { .. }
            | HedgeError::VsGroupFull { .. } => ApiError::Precondition(e.to_string()),

            HedgeError::SameAccountPair
            | HedgeError::NonPositiveLots
            | HedgeError::InvalidSide => ApiError::Validation(e.to_string()),

            HedgeError::BadQuote { .. }
            | HedgeError::OpenFailed { .. }
            | HedgeError::CloseFailed { .. }
            | HedgeError::Upstream(_) => ApiError::Internal(e.to_string()),

            HedgeError::Serialization(_) | HedgeError::Storage(_) | HedgeError::Other(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
