use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    DatabaseError(#[from] waypost_db::error::DbError),

    #[error(transparent)]
    CoreError(#[from] waypost_core::error::CoreError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Duplicate create for an existing entity mapping. The message
    /// directs the caller to the update path.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// CRM lookup or RPC failure, carrying the upstream message.
    #[error("CRM error: {0}")]
    CrmError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
