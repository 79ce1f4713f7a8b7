//! Local disk storage implementation
//!
//! Buckets are directories and objects are files under a configured
//! directory prefix. The store remembers every file and directory it created
//! itself and refuses to delete anything else, whatever permission the caller
//! holds at the façade. [`LocalDiskStore::purge`] is the one deliberate
//! override.

use bytes::Bytes;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::confine::DELIMITER;
use crate::error::{Result, StoreError};
use crate::storage::{validate_path, Storage};

/// Local disk storage implementation
pub struct LocalDiskStore {
    prefix: PathBuf,
    created_files: HashSet<PathBuf>,
    created_dirs: HashSet<PathBuf>,
}

impl LocalDiskStore {
    /// Open a store rooted at `prefix`, creating the directory if absent.
    ///
    /// The prefix itself is backend location, not a bucket, and is never
    /// recorded as created.
    pub fn new(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref().to_path_buf();
        if !prefix.exists() {
            fs::create_dir_all(&prefix)?;
            info!("Created storage directory: {}", prefix.display());
        } else if !prefix.is_dir() {
            return Err(StoreError::Config(format!(
                "storage prefix is not a directory: {}",
                prefix.display()
            )));
        }
        info!("Using storage directory: {}", prefix.display());

        Ok(Self {
            prefix,
            created_files: HashSet::new(),
            created_dirs: HashSet::new(),
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// True if this instance created the file behind `path`.
    pub fn owns_file(&self, path: &str) -> bool {
        self.resolve(path)
            .map_or(false, |full| self.created_files.contains(&full))
    }

    /// True if this instance created the directory behind `path`.
    pub fn owns_dir(&self, path: &str) -> bool {
        self.resolve(path)
            .map_or(false, |full| self.created_dirs.contains(&full))
    }

    /// Map a key onto the filesystem. A trailing delimiter is dropped.
    ///
    /// Symlinks anywhere below the prefix are refused, so a key can never
    /// resolve outside it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        let mut full = self.prefix.clone();
        let mut probing = true;
        for segment in path.split(DELIMITER).filter(|s| !s.is_empty() && *s != ".") {
            full.push(segment);
            if !probing {
                continue;
            }
            match fs::symlink_metadata(&full) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    warn!("Refusing to follow symlink {}", full.display());
                    return Err(StoreError::OutOfBounds(path.to_string()));
                }
                Ok(_) => {}
                // Nothing below a missing component can exist.
                Err(_) => probing = false,
            }
        }
        Ok(full)
    }

    /// Create every missing directory between the prefix and `dir`,
    /// recording each one as created.
    fn create_parents(&mut self, dir: &Path) -> Result<()> {
        let relative = dir.strip_prefix(&self.prefix).map_err(|_| {
            StoreError::OutOfBounds(dir.display().to_string())
        })?;

        let mut current = self.prefix.clone();
        for component in relative.components() {
            current.push(component);
            if current.is_dir() {
                continue;
            }
            if current.exists() {
                return Err(StoreError::KeyIsObject(current.display().to_string()));
            }
            fs::create_dir(&current)?;
            debug!("Created intermediate directory {}", current.display());
            self.created_dirs.insert(current.clone());
        }
        Ok(())
    }

    fn forget_tree(&mut self, root: &Path) {
        self.created_files.retain(|p| !p.starts_with(root));
        self.created_dirs.retain(|p| !p.starts_with(root));
    }

    /// Remove `path` and everything under it, created here or not.
    ///
    /// This is the explicit escape hatch for foreign content; nothing else in
    /// the crate deletes a file this instance did not create.
    pub fn purge(&mut self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            fs::remove_dir_all(&full)?;
        } else if full.exists() {
            fs::remove_file(&full)?;
        } else {
            return Err(StoreError::NotFound(path.to_string()));
        }
        self.forget_tree(&full);
        warn!("Purged {} including content not created by this store", full.display());
        Ok(())
    }
}

impl Storage for LocalDiskStore {
    fn is_bucket(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    fn is_object(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let full = self.resolve(path)?;
        if !full.is_dir() {
            return Ok(None);
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&full)? {
            match entry?.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!("Skipping non-UTF-8 entry {:?} in {}", raw, full.display()),
            }
        }
        names.sort();
        Ok(Some(names))
    }

    fn create_bucket(&mut self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        if full.exists() {
            return Err(StoreError::KeyIsObject(path.to_string()));
        }
        match full.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => return Err(StoreError::NotFound(format!("parent of {}", path))),
        }

        fs::create_dir(&full)?;
        self.created_dirs.insert(full.clone());
        info!("Created directory {}", full.display());
        Ok(())
    }

    fn create_object(&mut self, path: &str, value: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(StoreError::KeyIsBucket(path.to_string()));
        }
        if path.ends_with(DELIMITER) {
            return Err(StoreError::InvalidObjectKey(path.to_string()));
        }
        if let Some(parent) = full.parent() {
            self.create_parents(parent)?;
        }

        let existed = full.exists();
        fs::write(&full, value)?;
        // Overwriting a pre-existing file does not make it ours.
        if !existed {
            self.created_files.insert(full.clone());
        }
        info!("Wrote {} bytes to {}", value.len(), full.display());
        Ok(())
    }

    fn read_object(&self, path: &str) -> Result<Option<Bytes>> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Ok(None);
        }
        let data = fs::read(&full)?;
        debug!("Read {} bytes from {}", data.len(), full.display());
        Ok(Some(Bytes::from(data)))
    }

    fn delete_bucket(&mut self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_dir() {
            return Err(if full.exists() {
                StoreError::KeyIsObject(path.to_string())
            } else {
                StoreError::NotFound(path.to_string())
            });
        }
        if !self.created_dirs.contains(&full) {
            warn!("Refusing to delete directory not created by this store: {}", full.display());
            return Err(StoreError::NotOwned(path.to_string()));
        }
        if fs::read_dir(&full)?.next().is_some() {
            return Err(StoreError::NotEmpty(path.to_string()));
        }

        fs::remove_dir(&full)?;
        self.created_dirs.remove(&full);
        info!("Deleted directory {}", full.display());
        Ok(())
    }

    fn delete_object(&mut self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(if full.is_dir() {
                StoreError::KeyIsBucket(path.to_string())
            } else {
                StoreError::NotFound(path.to_string())
            });
        }
        if !self.created_files.contains(&full) {
            warn!("Refusing to delete file not created by this store: {}", full.display());
            return Err(StoreError::NotOwned(path.to_string()));
        }

        fs::remove_file(&full)?;
        self.created_files.remove(&full);
        info!("Deleted file {}", full.display());
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalDiskStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalDiskStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_new_creates_missing_prefix() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("nested").join("prefix");
        let store = LocalDiskStore::new(&prefix).unwrap();
        assert!(prefix.is_dir());
        assert_eq!(store.prefix(), prefix.as_path());
    }

    #[test]
    fn test_local_disk_store_basic_operations() {
        let (dir, mut store) = setup();

        store.create_bucket("store").unwrap();
        store.create_object("store/x", b"Hello, Local Storage!").unwrap();

        assert!(store.is_bucket("store").unwrap());
        assert!(store.is_object("store/x").unwrap());
        assert_eq!(
            store.read_object("store/x").unwrap().unwrap(),
            Bytes::from_static(b"Hello, Local Storage!")
        );
        assert_eq!(store.list("store").unwrap().unwrap(), vec!["x".to_string()]);
        assert!(dir.path().join("store").join("x").is_file());

        store.delete_object("store/x").unwrap();
        store.delete_bucket("store").unwrap();
        assert!(!dir.path().join("store").exists());
    }

    #[test]
    fn test_object_write_creates_and_owns_intermediate_dirs() {
        let (dir, mut store) = setup();
        store.create_object("store/a/b/x", b"deep").unwrap();

        assert!(dir.path().join("store/a/b").is_dir());
        assert!(store.owns_dir("store"));
        assert!(store.owns_dir("store/a/b"));
        assert!(store.owns_file("store/a/b/x"));
    }

    #[test]
    fn test_foreign_files_cannot_be_deleted() {
        let (dir, mut store) = setup();
        fs::create_dir(dir.path().join("store")).unwrap();
        fs::write(dir.path().join("store").join("foreign"), b"not yours").unwrap();

        assert!(matches!(store.delete_object("store/foreign"), Err(StoreError::NotOwned(_))));
        assert!(matches!(store.delete_bucket("store"), Err(StoreError::NotOwned(_))));

        // Overwriting keeps it foreign.
        store.create_object("store/foreign", b"still not yours").unwrap();
        assert!(!store.owns_file("store/foreign"));
        assert!(matches!(store.delete_object("store/foreign"), Err(StoreError::NotOwned(_))));
    }

    #[test]
    fn test_directory_is_never_an_object() {
        let (_dir, mut store) = setup();
        store.create_bucket("store").unwrap();

        assert!(matches!(store.create_object("store", b"x"), Err(StoreError::KeyIsBucket(_))));
        assert!(matches!(store.create_object("store/", b"x"), Err(StoreError::KeyIsBucket(_))));
        assert!(matches!(
            store.create_object("store/missing/", b"x"),
            Err(StoreError::InvalidObjectKey(_))
        ));
    }

    #[test]
    fn test_traversal_rejected_at_backend() {
        let (_dir, mut store) = setup();
        assert!(matches!(store.is_bucket("../outside"), Err(StoreError::TraversalRejected(_))));
        assert!(matches!(
            store.create_object("store/../../x", b"x"),
            Err(StoreError::TraversalRejected(_))
        ));
    }

    #[test]
    fn test_delete_bucket_requires_empty() {
        let (_dir, mut store) = setup();
        store.create_bucket("store").unwrap();
        store.create_object("store/x", b"1").unwrap();

        assert!(matches!(store.delete_bucket("store"), Err(StoreError::NotEmpty(_))));
        store.delete_object("store/x").unwrap();
        store.delete_bucket("store").unwrap();
    }

    #[test]
    fn test_create_bucket_needs_parent() {
        let (_dir, mut store) = setup();
        assert!(matches!(store.create_bucket("store/a"), Err(StoreError::NotFound(_))));
        store.create_bucket("store").unwrap();
        store.create_bucket("store/a").unwrap();
        assert!(matches!(store.create_bucket("store/a"), Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn test_delete_all_stops_at_first_foreign_child() {
        let (dir, mut store) = setup();
        store.create_bucket("store").unwrap();
        store.create_object("store/a", b"1").unwrap();
        fs::write(dir.path().join("store").join("b"), b"foreign").unwrap();
        store.create_object("store/c", b"3").unwrap();

        match store.delete_all("store") {
            Err(StoreError::NotOwned(child)) => assert_eq!(child, "store/b"),
            other => panic!("expected NotOwned, got {:?}", other),
        }
        // Non-transactional: "a" is already gone, "c" was never reached.
        assert!(!dir.path().join("store/a").exists());
        assert!(dir.path().join("store/b").exists());
        assert!(dir.path().join("store/c").exists());
    }

    #[test]
    fn test_delete_all_removes_owned_tree() {
        let (dir, mut store) = setup();
        store.create_object("store/a/x", b"1").unwrap();
        store.create_object("store/b", b"2").unwrap();

        store.delete_all("store").unwrap();
        assert!(!dir.path().join("store").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_refused() {
        let (dir, mut store) = setup();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), b"outside").unwrap();
        store.create_bucket("store").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("store").join("link")).unwrap();

        assert!(matches!(store.is_bucket("store/link"), Err(StoreError::OutOfBounds(_))));
        assert!(matches!(
            store.read_object("store/link/secret"),
            Err(StoreError::OutOfBounds(_))
        ));
        assert!(matches!(
            store.create_object("store/link/planted", b"x"),
            Err(StoreError::OutOfBounds(_))
        ));
        assert!(!outside.path().join("planted").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, mut store) = setup();
        store.create_bucket("store").unwrap();
        store.create_object("store/ok", b"1").unwrap();
        fs::write(dir.path().join("store").join(OsStr::from_bytes(b"bad\xff")), b"2").unwrap();

        assert_eq!(store.list("store").unwrap(), Some(vec!["ok".to_string()]));
        store.delete_object("store/ok").unwrap();
        // The skipped entry still keeps the directory from being removed.
        assert!(matches!(store.delete_bucket("store"), Err(StoreError::NotEmpty(_))));
    }

    #[test]
    fn test_purge_removes_foreign_content() {
        let (dir, mut store) = setup();
        store.create_object("store/mine", b"1").unwrap();
        fs::write(dir.path().join("store").join("theirs"), b"2").unwrap();

        store.purge("store").unwrap();
        assert!(!dir.path().join("store").exists());
        assert!(!store.owns_file("store/mine"));
        assert!(matches!(store.purge("store"), Err(StoreError::NotFound(_))));
    }
}
