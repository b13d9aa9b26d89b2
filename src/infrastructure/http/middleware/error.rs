use crate::domain::errors::DomainError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InvalidState(String),
    CapacityExceeded(String),
    Validation(String),
    Unauthorized,
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// Machine-readable error kind returned in the `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::InvalidState(_) => "InvalidState",
            ApiError::CapacityExceeded(_) => "CapacityExceeded",
            ApiError::Validation(_) => "ValidationError",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidState(_)
            | ApiError::CapacityExceeded(_)
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            ApiError::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match self {
            ApiError::Internal(msg) => {
                // Details stay in the logs
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg)
            | ApiError::InvalidState(msg)
            | ApiError::CapacityExceeded(msg)
            | ApiError::Validation(msg)
            | ApiError::Conflict(msg) => msg,
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::InvalidState(msg) => ApiError::InvalidState(msg),
            DomainError::CapacityExceeded(msg) => ApiError::CapacityExceeded(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
