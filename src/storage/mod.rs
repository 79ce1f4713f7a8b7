//! Storage Backend Abstraction
//!
//! This module defines the capability contract every storage provider
//! implements, so the store façade can run over local disk, memory, SQLite or
//! a remote object store without changing its gating logic.
//!
//! Backends only answer "does it exist" and "do it". They never consult
//! permission modes, rules or the façade's ownership ledger.

pub mod config;
pub mod local_store;
pub mod memory_store;
pub mod sqlite_store;


use bytes::Bytes;
use log::debug;

use crate::confine::{has_traversal, DELIMITER};
use crate::error::{Result, StoreError};

/// Trait defining the backend capability contract.
///
/// Paths are root-qualified, `/`-delimited keys such as `"store/a/x"`.
pub trait Storage: Send {
    /// True if `path` is an existing bucket
    fn is_bucket(&self, path: &str) -> Result<bool>;

    /// True if `path` is an existing object
    fn is_object(&self, path: &str) -> Result<bool>;

    /// Child names of a bucket, or `None` if `path` is not an existing bucket
    fn list(&self, path: &str) -> Result<Option<Vec<String>>>;

    /// Create an empty bucket; fails if anything exists at `path`
    fn create_bucket(&mut self, path: &str) -> Result<()>;

    /// Create or overwrite an object; fails if `path` is a bucket
    fn create_object(&mut self, path: &str, value: &[u8]) -> Result<()>;

    /// Object contents, or `None` if there is no object at `path`
    fn read_object(&self, path: &str) -> Result<Option<Bytes>>;

    /// Delete an existing, empty bucket
    fn delete_bucket(&mut self, path: &str) -> Result<()>;

    /// Delete an existing object
    fn delete_object(&mut self, path: &str) -> Result<()>;

    /// True if the backend lives on the caller's machine
    fn is_local(&self) -> bool;

    /// Recursively delete a bucket's contents and then the bucket.
    ///
    /// Children go through `delete_object`/`delete_bucket`, so the backend's
    /// own safety rules apply to each one. Not transactional: the first child
    /// that cannot be removed aborts the walk, and whatever was already
    /// deleted stays deleted. The error names that child.
    fn delete_all(&mut self, path: &str) -> Result<()> {
        let children = self
            .list(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        for name in children {
            let child = format!("{}{}{}", path, DELIMITER, name);
            if self.is_bucket(&child)? {
                self.delete_all(&child)?;
            } else {
                self.delete_object(&child)?;
            }
        }

        debug!("Removing emptied bucket {}", path);
        self.delete_bucket(path)
    }
}

/// Reject traversal segments and empty paths at the backend boundary.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    if has_traversal(path) {
        return Err(StoreError::TraversalRejected(path.to_string()));
    }
    if path.trim_matches(DELIMITER).is_empty() || path.starts_with(DELIMITER) {
        return Err(StoreError::OutOfBounds(path.to_string()));
    }
    Ok(())
}
