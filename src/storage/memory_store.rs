//! In-memory implementation of the Storage trait

use bytes::Bytes;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

use crate::confine::{split_parent, DELIMITER};
use crate::error::{Result, StoreError};
use crate::storage::{validate_path, Storage};

/// In-memory storage, mainly for tests and ephemeral stores.
///
/// Unlike the local disk store, every create requires the parent bucket to
/// exist and there is no provenance floor: anything present may be deleted.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    buckets: BTreeSet<String>,
    objects: BTreeMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Clear all data from the store
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.objects.clear();
    }

    fn key(path: &str) -> Result<&str> {
        validate_path(path)?;
        Ok(path.trim_end_matches(DELIMITER))
    }

    fn parent_exists(&self, path: &str) -> bool {
        match split_parent(path) {
            (Some(parent), _) => self.buckets.contains(parent),
            (None, _) => true,
        }
    }

    fn children(&self, path: &str) -> Vec<String> {
        let buckets = self.buckets.iter().map(String::as_str);
        let objects = self.objects.keys().map(String::as_str);
        let mut names: Vec<String> = buckets
            .chain(objects)
            .filter_map(|candidate| match split_parent(candidate) {
                (Some(parent), name) if parent == path => Some(name.to_string()),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }
}

impl Storage for MemoryStore {
    fn is_bucket(&self, path: &str) -> Result<bool> {
        Ok(self.buckets.contains(Self::key(path)?))
    }

    fn is_object(&self, path: &str) -> Result<bool> {
        Ok(self.objects.contains_key(Self::key(path)?))
    }

    fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let key = Self::key(path)?;
        if !self.buckets.contains(key) {
            return Ok(None);
        }
        Ok(Some(self.children(key)))
    }

    fn create_bucket(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        if self.buckets.contains(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        if self.objects.contains_key(key) {
            return Err(StoreError::KeyIsObject(key.to_string()));
        }
        if !self.parent_exists(key) {
            return Err(StoreError::NotFound(format!("parent of {}", key)));
        }
        self.buckets.insert(key.to_string());
        info!("Memory: created bucket {}", key);
        Ok(())
    }

    fn create_object(&mut self, path: &str, value: &[u8]) -> Result<()> {
        let key = Self::key(path)?;
        if self.buckets.contains(key) {
            return Err(StoreError::KeyIsBucket(key.to_string()));
        }
        if path.ends_with(DELIMITER) {
            return Err(StoreError::InvalidObjectKey(path.to_string()));
        }
        if !self.parent_exists(key) {
            return Err(StoreError::NotFound(format!("parent of {}", key)));
        }
        self.objects.insert(key.to_string(), Bytes::copy_from_slice(value));
        info!("Memory: wrote {} bytes to {}", value.len(), key);
        Ok(())
    }

    fn read_object(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.objects.get(Self::key(path)?).cloned())
    }

    fn delete_bucket(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        if !self.buckets.contains(key) {
            return Err(if self.objects.contains_key(key) {
                StoreError::KeyIsObject(key.to_string())
            } else {
                StoreError::NotFound(key.to_string())
            });
        }
        if !self.children(key).is_empty() {
            return Err(StoreError::NotEmpty(key.to_string()));
        }
        self.buckets.remove(key);
        info!("Memory: deleted bucket {}", key);
        Ok(())
    }

    fn delete_object(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        if self.objects.remove(key).is_none() {
            return Err(if self.buckets.contains(key) {
                StoreError::KeyIsBucket(key.to_string())
            } else {
                StoreError::NotFound(key.to_string())
            });
        }
        info!("Memory: deleted object {}", key);
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }
}
