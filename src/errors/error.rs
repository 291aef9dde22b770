use std::fmt;
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Error executing statement: {0}")]
    Execution(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(String),
}

/// Domain-level errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External error: {0}")]
    External(String),
}

/// Service-level errors (application specific)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Core not initialized: {0}")]
    NotInitialized(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

/// Validation errors
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' must be at least {min} characters")]
    MinLength { field: String, min: usize },

    #[error("Field '{field}' cannot exceed {max} characters")]
    MaxLength { field: String, max: usize },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format { field: String, reason: String },

    #[error("Field '{field}' must be unique")]
    Unique { field: String },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn min_length(field: &str, min: usize) -> Self {
        Self::MinLength {
            field: field.to_string(),
            min,
        }
    }

    pub fn max_length(field: &str, max: usize) -> Self {
        Self::MaxLength {
            field: field.to_string(),
            max,
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unique(field: &str) -> Self {
        Self::Unique {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn custom<M: fmt::Display>(message: M) -> Self {
        Self::Custom(message.to_string())
    }
}
