use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::CoreError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    code: &'static str,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    Core(CoreError),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) | CoreError::Eligibility(_) | CoreError::IntegrityGuard(_) => {
            StatusCode::BAD_REQUEST
        }
        CoreError::Authorization(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) | CoreError::DuplicateSubmission(_) => StatusCode::CONFLICT,
        CoreError::Store(_) | CoreError::Security(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body(status: StatusCode, code: &'static str, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), code, detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response =
                    body(StatusCode::UNAUTHORIZED, "unauthorized", message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::BadRequest(message) => {
                body(StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::Core(err) => {
                let status = core_status(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, code = err.code(), "Core operation failed");
                    return body(status, err.code(), "Internal server error".to_string());
                }
                body(status, err.code(), err.to_string())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}
