//! API error handling
//!
//! Structured error responses with proper HTTP status codes and request
//! tracking. Validation and funds problems are 4xx with no state change
//! behind them; transient ledger trouble is a 503 the client may retry.

use crate::errors::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (VALIDATION, INSUFFICIENT_FUNDS, WAGER_IN_FLIGHT, ...)
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// API error with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    BadRequest(String),
    InsufficientFunds(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn unauthorized(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized(message),
            request_id,
        }
    }

    pub fn forbidden(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Forbidden(message),
            request_id,
        }
    }

    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    /// Map an engine error to its API surface.
    pub fn from_engine(request_id: String, error: EngineError) -> Self {
        let kind = match &error {
            EngineError::Validation(_)
            | EngineError::OutcomeSource(_) => ApiErrorKind::BadRequest(error.to_string()),
            EngineError::InsufficientFunds { .. } => {
                ApiErrorKind::InsufficientFunds(error.to_string())
            }
            EngineError::WagerInFlight
            | EngineError::RoundSettling => ApiErrorKind::Conflict(error.to_string()),
            EngineError::NoActiveRound => ApiErrorKind::NotFound(error.to_string()),
            EngineError::Unauthenticated => ApiErrorKind::Unauthorized(error.to_string()),
            EngineError::Forbidden(_) => ApiErrorKind::Forbidden(error.to_string()),
            EngineError::AccountNotFound(_) | EngineError::WagerNotFound(_) => {
                ApiErrorKind::NotFound(error.to_string())
            }
            EngineError::LedgerUnavailable(_) => {
                ApiErrorKind::ServiceUnavailable(error.to_string())
            }
            EngineError::Inconsistency(_) => ApiErrorKind::InternalError(error.to_string()),
        };
        Self { kind, request_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, msg) = self.kind.parts();
        write!(f, "[{}] {}: {}", self.request_id, label, msg)
    }
}

impl std::error::Error for ApiError {}

impl ApiErrorKind {
    fn parts(&self) -> (&'static str, &str) {
        match self {
            ApiErrorKind::BadRequest(msg) => ("Bad Request", msg),
            ApiErrorKind::InsufficientFunds(msg) => ("Insufficient Funds", msg),
            ApiErrorKind::Unauthorized(msg) => ("Unauthorized", msg),
            ApiErrorKind::Forbidden(msg) => ("Forbidden", msg),
            ApiErrorKind::NotFound(msg) => ("Not Found", msg),
            ApiErrorKind::Conflict(msg) => ("Conflict", msg),
            ApiErrorKind::ServiceUnavailable(msg) => ("Service Unavailable", msg),
            ApiErrorKind::InternalError(msg) => ("Internal Error", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
            ApiErrorKind::InsufficientFunds(msg) => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS", msg.clone())
            }
            ApiErrorKind::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiErrorKind::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "WAGER_IN_FLIGHT", msg.clone()),
            ApiErrorKind::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg.clone())
            }
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
