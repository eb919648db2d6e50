use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Uniform "not-ok" response: an error code and message plus the operation
/// the caller was attempting, serialized as
/// `{"error": {"code": ..., "message": ...}, "operation": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    operation: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
    operation: &'a str,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            operation,
        }
    }

    /// Client supplied a missing or malformed parameter.
    pub fn invalid_request(message: impl Into<String>, operation: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, operation)
    }

    pub fn unauthorized(message: impl Into<String>, operation: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, operation)
    }

    pub fn access_denied(message: impl Into<String>, operation: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, "ACCESS_DENIED", message, operation)
    }

    pub fn not_found(message: impl Into<String>, operation: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, operation)
    }

    pub fn internal(message: impl Into<String>, operation: &'static str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            message,
            operation,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code: self.code,
                    message: &self.message,
                },
                operation: self.operation,
            }),
        )
            .into_response()
    }
}
