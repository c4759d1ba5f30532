use thiserror::Error;

use crate::core::clock::TimeParseError;
use crate::core::security::SecurityError;
use crate::repositories::StoreError;

/// Failures of core operations. Each variant carries a message fit for the caller.
#[derive(Debug, Error)]
pub(crate) enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Eligibility(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    DuplicateSubmission(String),
    #[error("{0}")]
    IntegrityGuard(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Security(#[from] SecurityError),
}

pub(crate) type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::Eligibility(_) => "eligibility_error",
            CoreError::Authorization(_) => "authorization_error",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::DuplicateSubmission(_) => "duplicate_submission",
            CoreError::IntegrityGuard(_) => "integrity_guard",
            CoreError::Store(_) => "storage_error",
            CoreError::Security(_) => "internal_error",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub(crate) fn eligibility(message: impl Into<String>) -> Self {
        CoreError::Eligibility(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        CoreError::Authorization(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }

    pub(crate) fn guard(guard: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!(guard, reason = %message, "integrity guard rejected operation");
        crate::core::metrics::integrity_guard_hit(guard);
        CoreError::IntegrityGuard(message)
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => {
                CoreError::Conflict(format!("Operation conflicts with existing data ({constraint})"))
            }
            other => CoreError::Store(other),
        }
    }
}

impl From<TimeParseError> for CoreError {
    fn from(err: TimeParseError) -> Self {
        CoreError::Validation(format!("Invalid date: {err}"))
    }
}
