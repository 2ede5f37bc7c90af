//! Maps [`EngineError`] onto the HTTP status/body contract in §6/§7.
//! Defined here (rather than in `flashbid-core`, which stays axum-free)
//! so both this crate's handlers and `flashbid-api`'s can reuse one
//! `IntoResponse` impl instead of duplicating the mapping per crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flashbid_core::EngineError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(EngineError::Internal(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            EngineError::CampaignNotFound => (StatusCode::NOT_FOUND, "CAMPAIGN_NOT_FOUND"),
            EngineError::ProductNotFound => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            EngineError::CampaignNotStarted => (StatusCode::FORBIDDEN, "CAMPAIGN_NOT_STARTED"),
            EngineError::CampaignEnded => (StatusCode::FORBIDDEN, "CAMPAIGN_ENDED"),
            EngineError::PriceTooLow { .. } => (StatusCode::BAD_REQUEST, "PRICE_TOO_LOW"),
            EngineError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            EngineError::EmailTaken => (StatusCode::BAD_REQUEST, "EMAIL_TAKEN"),
            EngineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            EngineError::AdminRequired => (StatusCode::FORBIDDEN, "ADMIN_REQUIRED"),
            EngineError::UserDisabled => (StatusCode::FORBIDDEN, "USER_DISABLED"),
            EngineError::LockNotAcquired | EngineError::ConcurrencyConflict => {
                (StatusCode::SERVICE_UNAVAILABLE, "CONCURRENCY_CONFLICT")
            }
            EngineError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            EngineError::Cache(_) | EngineError::Store(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INFRASTRUCTURE_ERROR")
            }
            EngineError::Config(_) | EngineError::Serialization(_) | EngineError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            EngineError::Invariant(detail) => {
                // Programming bug, not a caller-input condition (§7). The
                // process runs with `panic = "abort"` so this tears the
                // node down rather than serving an inconsistent response.
                panic!("invariant violated: {detail}");
            }
        };

        let retry_after = match &self.0 {
            EngineError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = Json(ErrorBody {
            code: code.to_string(),
            message: self.0.to_string(),
        });

        match retry_after {
            Some(secs) => (status, [("Retry-After", secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
