//! Error types for mobsync-core

use thiserror::Error;

/// Result type alias using mobsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mobsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Collection not found
    #[error("Collection not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collection registry is misconfigured (duplicate names, bad identifiers, missing columns)
    #[error("Invalid collection registry: {0}")]
    Registry(String),

    /// An operation was requested that the collection's sync mode does not expose
    #[error("Collection `{collection}` is a {mode} collection and has no {requested} operation")]
    ModeMismatch {
        collection: String,
        mode: crate::models::SyncMode,
        requested: crate::models::SyncMode,
    },

    /// A custom collection broke the resolver contract
    #[error("Collection `{collection}` violated the resolver contract: {reason}")]
    ContractViolation {
        collection: String,
        reason: &'static str,
    },
}
