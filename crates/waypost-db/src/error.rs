use thiserror::Error;

/// Database layer errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    DatabaseError(diesel::result::Error),

    #[error("Pool error: {0}")]
    PoolError(#[from] diesel_async::pooled_connection::bb8::RunError),

    /// A write hit the `(entity_id, page_type)` unique index. This is
    /// the store-level duplicate signal the service layer turns into a
    /// conflict response.
    #[error("A mapping already exists for entity {entity_id} ({page_type})")]
    Duplicate { entity_id: i64, page_type: String },

    #[error(transparent)]
    CoreError(#[from] waypost_core::error::CoreError),
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        Self::DatabaseError(err)
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
