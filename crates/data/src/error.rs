use thiserror::Error;

/// Errors raised by the position store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule was violated: duplicate protocol position id,
    /// or a second active position for the same pool.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("corrupt value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn from_insert(e: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what()),
            _ => Self::Database(e),
        }
    }
}
