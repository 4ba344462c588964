use thiserror::Error;

use crate::data::kv_backend::BackendError;

/// Business rules the rewards economy enforces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("coupon not found or inactive: {0}")]
    CouponUnavailable(String),
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed for '{field}': {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error("unexpected domain error: {0}")]
    Unexpected(String),
}

impl DomainError {
    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} id: {id}"))
    }

    /// True when the same call may succeed later without any change from the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Unavailable(_)))
    }

    /// Stable machine-readable code for calling layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::Forbidden => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Rule(RuleViolation::InsufficientPoints { .. }) => "insufficient_points",
            Self::Rule(RuleViolation::CouponUnavailable(_)) => "coupon_unavailable",
            Self::Backend(BackendError::Unavailable(_)) => "backend_unavailable",
            Self::Backend(BackendError::Corrupt { .. }) => "backend_corrupt",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
