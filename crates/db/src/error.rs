use packforge_core::error::CoreError;

/// Error type for graph and lifecycle operations, which mix domain
/// failures with database failures.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A domain-level rejection (validation, conflict, not-found).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// True when the underlying database error is a unique-constraint
    /// violation (PostgreSQL error code 23505).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}
