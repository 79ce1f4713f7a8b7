//! Path confinement
//!
//! Keys are relative, `/`-delimited paths. Every key is resolved against the
//! store's root before it reaches a backend, and any key that carries a `..`
//! segment is refused outright, even when normalization would keep it inside
//! the root.

use crate::error::{Result, StoreError};
use crate::permission::ResourceKind;
use crate::storage::Storage;

/// Segment delimiter for resource keys.
pub const DELIMITER: char = '/';

const PARENT: &str = "..";
const CURRENT: &str = ".";

/// True if any segment of `key` is a parent-traversal marker.
pub fn has_traversal(key: &str) -> bool {
    key.split(DELIMITER).any(|segment| segment == PARENT)
}

/// Resolve `key` against `root`.
///
/// Returns the root-qualified path (`"root/a/b"`, or `"root"` for an empty
/// key). A trailing delimiter on the key is preserved so object operations
/// can reject directory-like keys.
pub fn confine(root: &str, key: &str) -> Result<String> {
    let root = normalize_root(root)?;

    if has_traversal(key) {
        return Err(StoreError::TraversalRejected(key.to_string()));
    }
    if key.starts_with(DELIMITER) {
        // Joining an absolute key discards the root.
        return Err(StoreError::OutOfBounds(key.to_string()));
    }

    let segments: Vec<&str> = key
        .split(DELIMITER)
        .filter(|s| !s.is_empty() && *s != CURRENT)
        .collect();

    if segments.is_empty() {
        return Ok(root);
    }

    let mut joined = format!("{}{}{}", root, DELIMITER, segments.join("/"));
    if key.ends_with(DELIMITER) {
        joined.push(DELIMITER);
    }

    if !within(&root, &joined) {
        return Err(StoreError::OutOfBounds(key.to_string()));
    }
    Ok(joined)
}

/// Validate and canonicalize a root identifier.
pub fn normalize_root(root: &str) -> Result<String> {
    if has_traversal(root) {
        return Err(StoreError::TraversalRejected(root.to_string()));
    }
    let trimmed: Vec<&str> = root
        .split(DELIMITER)
        .filter(|s| !s.is_empty() && *s != CURRENT)
        .collect();
    if trimmed.is_empty() {
        return Err(StoreError::Config(format!("invalid root identifier: '{}'", root)));
    }
    Ok(trimmed.join("/"))
}

/// True if the already root-qualified `path` names the root or something
/// inside it.
pub fn is_under(root: &str, path: &str) -> bool {
    !has_traversal(path) && within(root, path.trim_end_matches(DELIMITER))
}

/// `path` equals `root` or lies under it on a segment boundary.
fn within(root: &str, path: &str) -> bool {
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with(DELIMITER),
        None => false,
    }
}

/// Split a path into its parent container and short name.
///
/// `"root/a/x"` → `("root/a", "x")`; a single-segment path has no parent.
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    let path = path.trim_end_matches(DELIMITER);
    match path.rsplit_once(DELIMITER) {
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    }
}

/// Check that the operation kind agrees with what already exists at `path`.
///
/// Object operations may not target a bucket or a directory-like key; bucket
/// operations may not target an object.
pub fn check_kind(storage: &dyn Storage, path: &str, kind: ResourceKind) -> Result<()> {
    let bare = path.trim_end_matches(DELIMITER);
    let is_bucket = storage.is_bucket(bare)?;
    let is_object = storage.is_object(bare)?;

    if is_bucket && is_object {
        return Err(StoreError::AmbiguousKey(path.to_string()));
    }

    match kind {
        ResourceKind::Object if is_bucket => Err(StoreError::KeyIsBucket(path.to_string())),
        ResourceKind::Object if path.ends_with(DELIMITER) => {
            Err(StoreError::InvalidObjectKey(path.to_string()))
        }
        ResourceKind::Bucket if is_object => Err(StoreError::KeyIsObject(path.to_string())),
        _ => Ok(()),
    }
}
