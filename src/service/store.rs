//! Bucket/object store façade
//!
//! Every public operation runs the same pipeline: confine the key under the
//! root, check the permission mode or rule set, check the kind of whatever
//! already exists, check ownership, call the backend, and only then update
//! the ownership ledger. A failed backend call never touches the ledger.
//!
//! A `Store` has one logical owner. Mutating operations take `&mut self`;
//! callers sharing a store across threads serialize through a lock.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::confine::{self, check_kind, normalize_root, DELIMITER};
use crate::error::{Result, StoreError};
use crate::ownership::OwnershipLedger;
use crate::permission::{Action, PermissionMode, PermissionRule, ResourceKind, RuleSet, Scope};
use crate::storage::Storage;

/// Log storage failures on their way out; refusals pass through quietly.
fn logged<T>(result: Result<T>, op: &str, path: &str) -> Result<T> {
    if let Err(e) = &result {
        if e.is_backend_failure() {
            error!("Backend failed to {} {}: {}", op, path, e);
        }
    }
    result
}

/// How mutations are authorized.
#[derive(Debug, Clone)]
pub enum Authority {
    /// Three-tier mode combined with the ownership ledger
    Mode(PermissionMode),
    /// Fine-grained CRUD rules; ownership is tracked but not consulted
    Rules(RuleSet),
}

/// Bucket/object store confined to a single root container.
pub struct Store {
    id: String,
    root: String,
    storage: Box<dyn Storage>,
    authority: Authority,
    ledger: OwnershipLedger,
}

impl Store {
    /// Open a store under the three-tier permission model.
    ///
    /// The root is created if absent and the mode allows it.
    pub fn new(mode: PermissionMode, root: &str, storage: Box<dyn Storage>) -> Result<Self> {
        Self::open(root, root, storage, Authority::Mode(mode))
    }

    /// Open a store under the fine-grained rule model.
    pub fn with_rules(id: &str, root: &str, storage: Box<dyn Storage>, rules: RuleSet) -> Result<Self> {
        Self::open(id, root, storage, Authority::Rules(rules))
    }

    fn open(id: &str, root: &str, storage: Box<dyn Storage>, authority: Authority) -> Result<Self> {
        let root = normalize_root(root)?;
        let mut store = Self {
            id: id.to_string(),
            root,
            storage,
            authority,
            ledger: OwnershipLedger::new(),
        };
        store.tag();

        let root = store.root.clone();
        if store.storage.is_object(&root)? {
            return Err(StoreError::KeyIsObject(root));
        }
        if !store.storage.is_bucket(&root)? {
            store.permit(&root, ResourceKind::Bucket, Action::Create)?;
            logged(store.storage.create_bucket(&root), "create", &root)?;
            store.ledger.record_bucket(&root);
            info!("Created root container {}", root);
        } else {
            debug!("Root container {} already exists; treating it as foreign", root);
        }

        info!("Opened store {} on root {}", store.id, store.root);
        Ok(store)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// The three-tier mode, if this store uses one.
    pub fn permission_mode(&self) -> Option<PermissionMode> {
        match &self.authority {
            Authority::Mode(mode) => Some(*mode),
            Authority::Rules(_) => None,
        }
    }

    pub fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Root-qualified id of `key`, as used by permission rules.
    pub fn resource_id(&self, key: &str) -> Result<String> {
        Ok(confine::confine(&self.root, key)?
            .trim_end_matches(DELIMITER)
            .to_string())
    }

    pub fn is_local(&self) -> bool {
        self.storage.is_local()
    }

    // -- gating --

    fn tag(&self) {
        log_mdc::insert("store", &self.id);
        log_mdc::insert("root", &self.root);
    }

    fn bucket_path(&self, name: &str) -> Result<String> {
        self.resource_id(name)
    }

    fn object_path(&self, key: &str) -> Result<String> {
        // Keep a trailing delimiter so directory-like keys can be refused.
        confine::confine(&self.root, key)
    }

    fn denied(&self, action: Action, path: &str) -> StoreError {
        warn!("Denied {} on {} for store {}", action, path, self.id);
        StoreError::PermissionDenied {
            action,
            key: path.to_string(),
        }
    }

    /// Mode or rule check. Reads are always allowed under the three-tier
    /// model.
    fn permit(&self, path: &str, kind: ResourceKind, action: Action) -> Result<()> {
        let allowed = match &self.authority {
            Authority::Mode(mode) => action == Action::Read || *mode != PermissionMode::Readonly,
            Authority::Rules(rules) => {
                let id = path.trim_end_matches(DELIMITER);
                rules.resolve(id, kind, action, Utc::now())
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(self.denied(action, path))
        }
    }

    /// Ownership check for update/delete. Only the `limited` mode consults
    /// the ledger.
    fn ensure_owned(&self, path: &str, kind: ResourceKind) -> Result<()> {
        if !matches!(self.authority, Authority::Mode(PermissionMode::Limited)) {
            return Ok(());
        }
        let owned = match kind {
            ResourceKind::Bucket => self.ledger.owns_bucket(path),
            ResourceKind::Object => self.ledger.owns_object(path),
        };
        if owned {
            Ok(())
        } else {
            warn!("Store {} does not own {}", self.id, path);
            Err(StoreError::NotOwned(path.to_string()))
        }
    }

    /// Ancestors of `path` below the root that are not buckets yet, outermost
    /// first.
    fn missing_ancestors(&self, path: &str) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        let mut current = path.trim_end_matches(DELIMITER);
        while let (Some(parent), _) = confine::split_parent(current) {
            if parent.len() <= self.root.len() || self.storage.is_bucket(parent)? {
                break;
            }
            missing.push(parent.to_string());
            current = parent;
        }
        missing.reverse();
        Ok(missing)
    }

    fn kind_at(&self, path: &str) -> Result<Option<ResourceKind>> {
        if self.storage.is_bucket(path)? {
            Ok(Some(ResourceKind::Bucket))
        } else if self.storage.is_object(path)? {
            Ok(Some(ResourceKind::Object))
        } else {
            Ok(None)
        }
    }

    // -- bucket operations --

    pub fn create_bucket(&mut self, name: &str) -> Result<()> {
        self.tag();
        let path = self.bucket_path(name)?;
        self.permit(&path, ResourceKind::Bucket, Action::Create)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Bucket)?;

        logged(self.storage.create_bucket(&path), "create", &path)?;
        self.ledger.record_bucket(&path);
        info!("Created bucket {}", path);
        Ok(())
    }

    /// Delete an empty bucket. The root can only go through [`Store::teardown`].
    pub fn delete_bucket(&mut self, name: &str) -> Result<()> {
        self.tag();
        let path = self.bucket_path(name)?;
        if path == self.root {
            return Err(self.denied(Action::Delete, &path));
        }
        self.permit(&path, ResourceKind::Bucket, Action::Delete)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Bucket)?;
        if !self.storage.is_bucket(&path)? {
            return Err(StoreError::NotFound(path));
        }
        self.ensure_owned(&path, ResourceKind::Bucket)?;

        logged(self.storage.delete_bucket(&path), "delete", &path)?;
        self.ledger.forget_bucket(&path);
        info!("Deleted bucket {}", path);
        Ok(())
    }

    /// Child names of a bucket (the root when `name` is empty), or `None` if
    /// there is no bucket there.
    pub fn list_contents(&self, name: &str) -> Result<Option<Vec<String>>> {
        self.tag();
        let path = self.bucket_path(name)?;
        self.permit(&path, ResourceKind::Bucket, Action::Read)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Bucket)?;
        self.storage.list(&path)
    }

    // -- object operations --

    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.tag();
        let path = self.object_path(key)?;
        self.permit(&path, ResourceKind::Object, Action::Read)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Object)?;
        debug!("Reading object {}", path);
        logged(self.storage.read_object(&path), "read", &path)
    }

    /// Create or overwrite an object.
    ///
    /// Under `limited`, an object that already exists but was not written by
    /// this store cannot be overwritten.
    pub fn set(&mut self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.tag();
        let path = self.object_path(key)?;
        let exists = self.storage.is_object(path.trim_end_matches(DELIMITER))?;
        let action = if exists { Action::Update } else { Action::Create };

        self.permit(&path, ResourceKind::Object, action)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Object)?;
        if exists {
            self.ensure_owned(&path, ResourceKind::Object)?;
        }
        let missing = self.missing_ancestors(&path)?;

        logged(self.storage.create_object(&path, value.as_ref()), "write", &path)?;
        // Backends that create intermediate buckets on write made them for us.
        for dir in missing {
            if matches!(self.storage.is_bucket(&dir), Ok(true)) {
                debug!("Recording implicitly created bucket {}", dir);
                self.ledger.record_bucket(&dir);
            }
        }
        self.ledger.record_object(&path);
        info!("Stored object {}", path);
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.tag();
        let path = self.object_path(key)?;
        self.permit(&path, ResourceKind::Object, Action::Delete)?;
        check_kind(self.storage.as_ref(), &path, ResourceKind::Object)?;
        if !self.storage.is_object(&path)? {
            return Err(StoreError::NotFound(path));
        }
        self.ensure_owned(&path, ResourceKind::Object)?;

        logged(self.storage.delete_object(&path), "delete", &path)?;
        self.ledger.forget_object(&path);
        info!("Deleted object {}", path);
        Ok(())
    }

    // -- queries --

    /// True if a bucket exists at `name`, whoever created it.
    pub fn is_bucket(&self, name: &str) -> Result<bool> {
        let path = self.bucket_path(name)?;
        self.storage.is_bucket(&path)
    }

    /// True if an object exists at `key`, whoever created it.
    pub fn is_object(&self, key: &str) -> Result<bool> {
        let path = self.bucket_path(key)?;
        self.storage.is_object(&path)
    }

    /// True if this store created the bucket at `name`.
    pub fn has_bucket(&self, name: &str) -> Result<bool> {
        let path = self.bucket_path(name)?;
        Ok(self.ledger.owns_bucket(&path))
    }

    /// True if this store wrote the object at `key`.
    pub fn has_object(&self, key: &str) -> Result<bool> {
        let path = self.bucket_path(key)?;
        Ok(self.ledger.owns_object(&path))
    }

    // -- fine-grained permissions --

    fn rules_mut(&mut self) -> Result<&mut RuleSet> {
        match &mut self.authority {
            Authority::Rules(rules) => Ok(rules),
            Authority::Mode(mode) => Err(StoreError::Config(format!(
                "store uses the {} permission mode, not rules",
                mode
            ))),
        }
    }

    pub fn rules(&self) -> Option<&RuleSet> {
        match &self.authority {
            Authority::Rules(rules) => Some(rules),
            Authority::Mode(_) => None,
        }
    }

    /// Register a rule, replacing any rule under the same scope.
    pub fn set_permission(&mut self, scope: Scope, rule: PermissionRule) -> Result<()> {
        info!("Setting permission for {:?} on store {}", scope, self.id);
        self.rules_mut()?.set(scope, rule)
    }

    pub fn get_permission(&self, scope: &Scope) -> Option<&PermissionRule> {
        self.rules().and_then(|rules| rules.get(scope))
    }

    pub fn remove_permission(&mut self, scope: &Scope) -> Result<Option<PermissionRule>> {
        Ok(self.rules_mut()?.remove(scope))
    }

    /// Set the expiry of every rule that applies to `scope`. Returns how many
    /// rules changed.
    ///
    /// Ids outside the root never reach the backend; only their exact and
    /// pattern rules are touched.
    pub fn set_expiry(&mut self, scope: &Scope, expiry: Option<DateTime<Utc>>) -> Result<usize> {
        let kind = match scope {
            Scope::Exact(id) if confine::is_under(&self.root, id) => self.kind_at(id)?,
            _ => None,
        };
        self.rules_mut()?.set_expiry(scope, kind, expiry)
    }

    /// Would `action` on the `kind` resource at `key` be allowed right now?
    ///
    /// Covers both models: under `limited`, update/delete also require
    /// ownership.
    pub fn has_permission(&self, key: &str, kind: ResourceKind, action: Action) -> Result<bool> {
        let path = self.bucket_path(key)?;
        let allowed = self.permit(&path, kind, action).is_ok()
            && (matches!(action, Action::Create | Action::Read)
                || self.ensure_owned(&path, kind).is_ok());
        Ok(allowed)
    }

    /// True if two or more live rules apply to the `kind` resource at `key`
    /// and disagree.
    pub fn permissions_conflict(&self, key: &str, kind: ResourceKind) -> Result<bool> {
        let path = self.bucket_path(key)?;
        Ok(self
            .rules()
            .map_or(false, |rules| rules.conflicts(&path, kind, Utc::now())))
    }

    // -- teardown --

    /// Delete the root container and everything in it, consuming the store.
    ///
    /// Not transactional: if a child cannot be removed the error names it and
    /// earlier deletions stand. Under `limited` every child must be in the
    /// ledger, not just the root.
    pub fn teardown(mut self) -> Result<()> {
        self.tag();
        let root = self.root.clone();
        self.permit(&root, ResourceKind::Bucket, Action::Delete)?;
        self.ensure_owned(&root, ResourceKind::Bucket)?;

        warn!("Tearing down root container {} of store {}", root, self.id);
        if matches!(self.authority, Authority::Mode(PermissionMode::Limited)) {
            self.remove_owned_tree(&root)
        } else {
            logged(self.storage.delete_all(&root), "tear down", &root)
        }
    }

    /// Depth-first removal that checks the ledger before touching each child.
    fn remove_owned_tree(&mut self, path: &str) -> Result<()> {
        let children = self
            .storage
            .list(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        for name in children {
            let child = format!("{}{}{}", path, DELIMITER, name);
            if self.storage.is_bucket(&child)? {
                self.ensure_owned(&child, ResourceKind::Bucket)?;
                self.remove_owned_tree(&child)?;
            } else {
                self.ensure_owned(&child, ResourceKind::Object)?;
                logged(self.storage.delete_object(&child), "delete", &child)?;
                self.ledger.forget_object(&child);
            }
        }

        logged(self.storage.delete_bucket(path), "delete", path)?;
        self.ledger.forget_bucket(path);
        debug!("Removed bucket {}", path);
        Ok(())
    }
}
