//! Domain error taxonomy
//!
//! Every business rule in this crate fails with a [`DomainError`]. The HTTP
//! layer maps each variant onto a status code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Caller's role or scope does not allow the operation
    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate serial, phone number or item, or an operation that was
    /// already applied
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    InsufficientStock(String),

    /// A record points at an item that no longer exists
    #[error("{0}")]
    DanglingReference(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Authorization(message.into())
    }

    /// `NotFound` with the conventional "<resource> not found" message
    pub fn not_found(resource: &str) -> Self {
        DomainError::NotFound(format!("{} not found", resource))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict(message.into())
    }

    /// Machine-readable code carried in error responses
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::Authorization(_) => "FORBIDDEN",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::InvalidTransition(_) => "INVALID_STATE_TRANSITION",
            DomainError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            DomainError::DanglingReference(_) => "DANGLING_REFERENCE",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
