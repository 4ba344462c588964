use serde::Serialize;

use crate::domain::error::DomainError;

/// `{ success, data | error, message }` body handed to calling layers.
///
/// `error` carries the stable code from [`DomainError::code`]; `message` the
/// human-readable text. Unexpected failures never leak their details.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            retryable: false,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn failure(err: &DomainError) -> Self {
        let message = match err {
            DomainError::Unexpected(_) => "internal error".to_string(),
            _ => err.to_string(),
        };
        Self {
            success: false,
            data: None,
            error: Some(err.code()),
            message: Some(message),
            retryable: err.is_retryable(),
        }
    }
}

impl<T> From<Result<T, DomainError>> for Envelope<T> {
    fn from(result: Result<T, DomainError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(&err),
        }
    }
}
