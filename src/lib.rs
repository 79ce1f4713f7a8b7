//! Confined bucket/object storage
//!
//! A [`Store`] keeps every key inside one root container, authorizes each
//! operation through a permission mode or a rule set, remembers what it
//! created, and delegates the bytes to a pluggable [`Storage`] backend.

pub mod config;
pub mod confine;
pub mod error;
pub mod logging;
pub mod ownership;
pub mod permission;
pub mod service;
pub mod storage;

pub use error::{Result, StoreError};
pub use permission::{Action, PermissionMode, PermissionRule, ResourceKind, RuleEntry, RuleSet, Scope};
pub use service::{Authority, Store};
pub use storage::local_store::LocalDiskStore;
pub use storage::memory_store::MemoryStore;
pub use storage::sqlite_store::SqliteStore;
pub use storage::Storage;
