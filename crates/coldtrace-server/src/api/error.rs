//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coldtrace_core::ColdtraceError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details.
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "malformed_format",
    "message": "Invalid manufacturer data format",
    "details": "record does not match the expected layout: TRK;123"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "malformed_format").
    #[schema(example = "malformed_format")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Invalid manufacturer data format")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::BadRequest { error_code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: error_code,
                        message,
                        details: details.map(serde_json::Value::String),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from coldtrace-core errors.
impl From<ColdtraceError> for ApiError {
    fn from(err: ColdtraceError) -> Self {
        match &err {
            ColdtraceError::MalformedRecord(_) => Self::BadRequest {
                error_code: "malformed_format".to_string(),
                message: err.to_string(),
            },
            // Every other failure is absorbed inside the pipeline except a
            // store read, so these only surface from the recent-readings query.
            _ => Self::InternalError {
                error_code: err.error_code().to_ascii_lowercase(),
                message: err.to_string(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldtrace_core::{DecodeError, DeliveryFailure, NotifyError, StoreError};

    #[test]
    fn test_malformed_record_is_bad_request() {
        let err = ApiError::from(ColdtraceError::from(DecodeError::GrammarMismatch {
            raw: "TRK;123".to_string(),
        }));
        match &err {
            ApiError::BadRequest { error_code, message } => {
                assert_eq!(error_code, "malformed_format");
                assert!(message.contains("TRK;123"));
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_failure_is_internal_error() {
        let err = ApiError::from(ColdtraceError::from(StoreError::Timeout(2000)));
        assert!(matches!(
            &err,
            ApiError::InternalError { error_code, .. } if error_code == "persistence_failure"
        ));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_degradable_failures_map_to_internal_error() {
        for err in [
            ColdtraceError::from(NotifyError::NotConfigured("telegram".to_string())),
            ColdtraceError::from(DeliveryFailure::QueueFull),
        ] {
            assert_eq!(
                ApiError::from(err).into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "malformed_format".to_string(),
            message: "Invalid manufacturer data format".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"malformed_format\""));
        assert!(json.contains("\"details\":null"));
    }
}
