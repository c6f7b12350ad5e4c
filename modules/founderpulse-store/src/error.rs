/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown owner: {0}")]
    UnknownOwner(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Map a foreign-key violation (Postgres 23503) onto the unknown-owner
    /// variant; everything else stays a database error.
    pub(crate) fn from_insert(err: sqlx::Error, owner: impl std::fmt::Display) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23503") {
                return StoreError::UnknownOwner(owner.to_string());
            }
        }
        StoreError::Database(err)
    }
}
