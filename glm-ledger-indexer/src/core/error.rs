//! Centralized error types for the ledger indexer

use thiserror::Error;

/// Main indexer error type
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transfer source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected caller input; never reaches the store
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Errors raised while talking to the block explorer
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Explorer returned HTTP {0}")]
    Status(u16),

    #[error("Explorer rate limit reached: {0}")]
    RateLimited(String),

    #[error("Malformed explorer payload: {0}")]
    Malformed(String),

    #[error("Explorer error: {0}")]
    Upstream(String),
}

impl SourceError {
    /// Whether the call may be retried after backing off
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited(_) | SourceError::Status(429))
    }
}

impl IndexerError {
    /// Whether this error should be reported to API callers as a client error
    pub fn is_client_error(&self) -> bool {
        matches!(self, IndexerError::Validation(_))
    }
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        IndexerError::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<sqlx::migrate::MigrateError> for IndexerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        IndexerError::Storage(StorageError::MigrationFailed(err.to_string()))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SourceError::Status(status.as_u16()),
            None => SourceError::Http(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        IndexerError::Source(err.into())
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Serialization(err.to_string())
    }
}
