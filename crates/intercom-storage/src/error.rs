use thiserror::Error;

/// Storage-specific error types for the unit registry.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity not found in database
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Stored data does not map onto a domain type
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StorageError> for intercom_core::Error {
    fn from(err: StorageError) -> Self {
        intercom_core::Error::registry(err)
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
