//! Ownership ledger
//!
//! Records which buckets and objects were created through one store
//! instance. Entries are added only after a successful create and removed
//! after a successful delete; pre-existing backend content is never adopted.
//! The ledger lives in memory for the lifetime of the store.

use std::collections::{HashMap, HashSet};

use crate::confine::split_parent;

#[derive(Debug, Clone, Default)]
pub struct OwnershipLedger {
    /// Root-qualified paths of buckets created here
    buckets: HashSet<String>,
    /// Container path → short names of members created here
    members: HashMap<String, HashSet<String>>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bucket created through this store.
    pub fn record_bucket(&mut self, path: &str) {
        self.buckets.insert(path.to_string());
        self.members.entry(path.to_string()).or_default();
        if let (Some(parent), name) = split_parent(path) {
            if let Some(siblings) = self.members.get_mut(parent) {
                siblings.insert(name.to_string());
            }
        }
    }

    /// Forget a bucket deleted through this store.
    pub fn forget_bucket(&mut self, path: &str) {
        self.buckets.remove(path);
        self.members.remove(path);
        self.forget_member(path);
    }

    /// Record an object written through this store.
    pub fn record_object(&mut self, path: &str) {
        if let (Some(parent), name) = split_parent(path) {
            self.members
                .entry(parent.to_string())
                .or_default()
                .insert(name.to_string());
        }
    }

    pub fn forget_object(&mut self, path: &str) {
        self.forget_member(path);
    }

    fn forget_member(&mut self, path: &str) {
        if let (Some(parent), name) = split_parent(path) {
            if let Some(siblings) = self.members.get_mut(parent) {
                siblings.remove(name);
                if siblings.is_empty() && !self.buckets.contains(parent) {
                    self.members.remove(parent);
                }
            }
        }
    }

    pub fn owns_bucket(&self, path: &str) -> bool {
        self.buckets.contains(path)
    }

    pub fn owns_object(&self, path: &str) -> bool {
        if self.buckets.contains(path) {
            return false;
        }
        match split_parent(path) {
            (Some(parent), name) => self
                .members
                .get(parent)
                .map_or(false, |siblings| siblings.contains(name)),
            (None, _) => false,
        }
    }

    /// Short names of members of `container` created here, sorted.
    pub fn members(&self, container: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .get(container)
            .map(|siblings| siblings.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.members.values().all(|m| m.is_empty())
    }
}
