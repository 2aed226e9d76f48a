use serde::Serialize;
use thiserror::Error;

use crate::resolutions::types::ResolutionId;

pub const VALIDATION_FAILED: &str = "Validation failed.";
pub const RESOLUTION_NOT_FOUND: &str = "Resolution not found.";
pub const INTERNAL_ERROR: &str = "Internal server error.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("resolution not found: id {0}")]
    NotFound(ResolutionId),
    #[error("route id {route_id} does not match body id {body_id}")]
    IdMismatch {
        route_id: ResolutionId,
        body_id: ResolutionId,
    },
    #[error("no resolution ids are left to assign")]
    IdsExhausted,
}

pub fn validation(detail: impl Into<String>) -> ResolutionError {
    ResolutionError::Validation(detail.into())
}

pub fn not_found(id: ResolutionId) -> ResolutionError {
    ResolutionError::NotFound(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiErrorKind {
    BadRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    RequestHeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
}

/// Shared `{error, message, details}` body returned for failed requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorKind,
    pub message: String,
    pub details: Vec<String>,
}

impl ApiErrorBody {
    pub fn new<I, S>(error: ApiErrorKind, message: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            error,
            message: message.into(),
            details: details.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bad_request<I, S>(message: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ApiErrorKind::BadRequest, message, details)
    }

    pub fn not_found<I, S>(message: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ApiErrorKind::NotFound, message, details)
    }

    pub fn internal<I, S>(details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ApiErrorKind::InternalServerError, INTERNAL_ERROR, details)
    }
}
