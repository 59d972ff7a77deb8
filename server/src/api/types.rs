//! Shared API types
//!
//! Error responses and query parameter helpers used across endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::time::parse_rfc3339;

/// Parse an optional timestamp string parameter (RFC 3339)
pub fn parse_timestamp_param(s: &Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match s {
        Some(ts) => parse_rfc3339(ts).map(Some).ok_or_else(|| {
            ApiError::bad_request(
                "INVALID_TIMESTAMP",
                format!("Invalid timestamp format: {}. Use RFC 3339 format.", ts),
            )
        }),
        None => Ok(None),
    }
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Unauthorized,
    Conflict { code: String, message: String },
    ServiceUnavailable { message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Uniform 401; never says which check failed
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn from_data(e: crate::data::DataError) -> Self {
        if let crate::data::DataError::Conflict(message) = e {
            return Self::conflict("CONFLICT", message);
        }
        tracing::error!(error = %e, backend = e.backend(), "Data error");
        if e.is_transient() {
            return Self::service_unavailable("Storage backend unavailable");
        }
        Self::Internal {
            message: "Database operation failed".to_string(),
        }
    }
}

impl From<crate::data::DataError> for ApiError {
    fn from(e: crate::data::DataError) -> Self {
        Self::from_data(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "UNAUTHORIZED".to_string(),
                "Missing or invalid credentials".to_string(),
            ),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "SERVICE_UNAVAILABLE".to_string(),
                message,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(ErrorBody {
                error: error_type.to_string(),
                code,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataError;

    #[test]
    fn test_parse_timestamp_param() {
        assert!(parse_timestamp_param(&None).unwrap().is_none());
        let ts = parse_timestamp_param(&Some("2024-05-01T00:00:00Z".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(ts.timestamp(), 1_714_521_600);
    }

    #[test]
    fn test_parse_timestamp_param_invalid() {
        let err = parse_timestamp_param(&Some("yesterday".to_string())).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { ref code, .. } if code == "INVALID_TIMESTAMP"));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::bad_request("X", "x"), StatusCode::BAD_REQUEST),
            (ApiError::not_found("X", "x"), StatusCode::NOT_FOUND),
            (ApiError::unauthorized(), StatusCode::UNAUTHORIZED),
            (ApiError::conflict("X", "x"), StatusCode::CONFLICT),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_data_error() {
        let transient = ApiError::from(DataError::timeout("clickhouse", 60));
        assert!(matches!(transient, ApiError::ServiceUnavailable { .. }));

        let other = ApiError::from(DataError::Config("bad".into()));
        assert!(matches!(other, ApiError::Internal { .. }));

        let conflict = ApiError::from(DataError::Conflict("duplicate".into()));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);
    }
}
