use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use gleaner_core::error::AppError;

use crate::dto::ErrorResponse;

/// Errors returned by route handlers.
pub enum ApiError {
    App(AppError),
    /// The request itself is malformed.
    BadRequest(String),
    /// The request is valid but the run is in the wrong state for it.
    Conflict(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::App(err) => {
                let (status, error_type) = match &err {
                    AppError::SerializationError(_) => {
                        (StatusCode::BAD_REQUEST, "serialization_error")
                    }
                    AppError::CoordinatorClosed => {
                        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
                    }
                    AppError::ConfigError(_) | AppError::SelectorError { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
                    }
                    AppError::ExportError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "export_error"),
                    AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, error_type, err.to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
