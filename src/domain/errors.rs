use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable error code surfaced to callers alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "NotFound",
            DomainError::InvalidState(_) => "InvalidState",
            DomainError::CapacityExceeded(_) => "CapacityExceeded",
            DomainError::Conflict(_) => "Conflict",
            DomainError::Validation(_) => "ValidationError",
            DomainError::Internal(_) => "Internal",
        }
    }

    /// Expected outcomes are returned to the caller as-is; only `Internal`
    /// indicates a failed transaction.
    pub fn is_internal(&self) -> bool {
        matches!(self, DomainError::Internal(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
