/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use corrmon_storage::StorageError;
///
/// let err = StorageError::Other("rule name missing".to_string());
/// assert!(err.to_string().contains("rule name"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SeaORM / SQLite error.
    #[error("Storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// JSON serialization or deserialization failure (e.g. the
    /// definition_sql and grouping_criteria columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

impl StorageError {
    /// True when the error stems from a SQLite UNIQUE constraint, which the
    /// API layer maps to a 409 conflict.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Db(e) if e.to_string().contains("UNIQUE constraint"))
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
