//! Common error types for SiteIQ

use thiserror::Error;

/// Common result type for SiteIQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the SiteIQ crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of a stored document failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or incomplete schema or service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller violated an API contract (empty key, empty record, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator store failed for a reason other than the database driver
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether repeating the same operation without operator intervention
    /// can succeed.
    ///
    /// Configuration and contract violations fail identically on every
    /// attempt; everything touching I/O is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::InvalidInput(_))
    }
}
