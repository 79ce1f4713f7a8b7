//! Error types for the bucket façade.

use crate::permission::Action;

/// Errors surfaced by the store façade and its backends.
///
/// Denials (`PermissionDenied`, `NotOwned`) are ordinary values callers are
/// expected to branch on; `Io` and `Database` mean the storage itself failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The permission mode or rule set disallows the action
    #[error("permission denied: cannot {action} '{key}'")]
    PermissionDenied { action: Action, key: String },

    /// The resource was not created by this instance
    #[error("not owned by this store: {0}")]
    NotOwned(String),

    /// The key resolves outside the root container
    #[error("key escapes the root container: {0}")]
    OutOfBounds(String),

    /// The key contains a parent-traversal segment
    #[error("parent traversal rejected: {0}")]
    TraversalRejected(String),

    /// An object operation targeted an existing bucket
    #[error("key is a bucket: {0}")]
    KeyIsBucket(String),

    /// A bucket operation targeted an existing object
    #[error("key is an object: {0}")]
    KeyIsObject(String),

    /// The backend reports the key as both a bucket and an object
    #[error("key is both a bucket and an object: {0}")]
    AmbiguousKey(String),

    /// Directory-like key used as an object key
    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bucket is not empty: {0}")]
    NotEmpty(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Pattern scope failed to compile
    #[error("invalid rule pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StoreError {
    /// True for permission and ownership refusals.
    pub fn is_denial(&self) -> bool {
        matches!(self, StoreError::PermissionDenied { .. } | StoreError::NotOwned(_))
    }

    /// True for keys that escape, or try to escape, the root.
    pub fn is_confinement(&self) -> bool {
        matches!(self, StoreError::OutOfBounds(_) | StoreError::TraversalRejected(_))
    }

    /// True when the underlying storage failed rather than refused.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Database(_))
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
