//! Error types for the semi-atlas library.
//!
//! This module provides custom error types using `thiserror` so callers can
//! tell persistence failures, validation failures and import failures apart.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur in the semi-atlas library.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Requested row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name (company, roadmap, insight, user)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Foreign key, unique or check constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Input rejected before any request was issued
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Uploaded delimited file could not be turned into rows
    #[error("Import failed: {0}")]
    Import(String),

    /// CSV reader/writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport errors talking to the hosted backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hosted backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// A blocking database task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with `AtlasError`
pub type Result<T> = std::result::Result<T, AtlasError>;

impl AtlasError {
    /// Shorthand for a missing row
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for errors caused by the caller's input rather than the backend
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Import(_) | Self::Constraint(_) | Self::NotFound { .. }
        )
    }
}

impl From<rusqlite::Error> for AtlasError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Database(other),
        }
    }
}

impl From<anyhow::Error> for AtlasError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
