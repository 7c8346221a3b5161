// errors.rs
use thiserror::Error;

/// Errors originating from either the marketplace rules
/// (validation, guards on status writes) or downstream layers (DB, config).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// The write is well-formed but the record's current state forbids it.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database Error: {0}")]
    DbError(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Internal Error")]
    InternalError,
}

pub type AppResult<T> = Result<T, AppError>;
