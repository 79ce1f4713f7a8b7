//! SQLite implementation of the Storage trait

use bytes::Bytes;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;

use crate::confine::{split_parent, DELIMITER};
use crate::error::{Result, StoreError};
use crate::storage::{validate_path, Storage};

const KIND_BUCKET: i64 = 0;
const KIND_OBJECT: i64 = 1;

/// Buckets and objects as rows of a single `entries` table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file, creating its directory if needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        info!("Using SQLite storage at {}", db_path.display());
        Self::init(Connection::open(db_path)?)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                path TEXT PRIMARY KEY,
                kind INTEGER NOT NULL,
                value BLOB
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    fn kind_of(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT kind FROM entries WHERE path = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    fn parent_exists(&self, key: &str) -> Result<bool> {
        match split_parent(key) {
            (Some(parent), _) => Ok(self.kind_of(parent)? == Some(KIND_BUCKET)),
            (None, _) => Ok(true),
        }
    }

    fn has_children(&self, key: &str) -> Result<bool> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entries
                WHERE substr(path, 1, length(?1) + 1) = ?1 || '/')",
            params![key],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn key(path: &str) -> Result<&str> {
        validate_path(path)?;
        Ok(path.trim_end_matches(DELIMITER))
    }
}

impl Storage for SqliteStore {
    fn is_bucket(&self, path: &str) -> Result<bool> {
        Ok(self.kind_of(Self::key(path)?)? == Some(KIND_BUCKET))
    }

    fn is_object(&self, path: &str) -> Result<bool> {
        Ok(self.kind_of(Self::key(path)?)? == Some(KIND_OBJECT))
    }

    fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let key = Self::key(path)?;
        if self.kind_of(key)? != Some(KIND_BUCKET) {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT substr(path, length(?1) + 2) FROM entries
             WHERE substr(path, 1, length(?1) + 1) = ?1 || '/'
               AND instr(substr(path, length(?1) + 2), '/') = 0
             ORDER BY path",
        )?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(Some(names))
    }

    fn create_bucket(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        match self.kind_of(key)? {
            Some(KIND_BUCKET) => return Err(StoreError::AlreadyExists(key.to_string())),
            Some(_) => return Err(StoreError::KeyIsObject(key.to_string())),
            None => {}
        }
        if !self.parent_exists(key)? {
            return Err(StoreError::NotFound(format!("parent of {}", key)));
        }

        self.conn.execute(
            "INSERT INTO entries (path, kind, value) VALUES (?1, ?2, NULL)",
            params![key, KIND_BUCKET],
        )?;
        info!("SQLite: created bucket {}", key);
        Ok(())
    }

    fn create_object(&mut self, path: &str, value: &[u8]) -> Result<()> {
        let key = Self::key(path)?;
        if self.kind_of(key)? == Some(KIND_BUCKET) {
            return Err(StoreError::KeyIsBucket(key.to_string()));
        }
        if path.ends_with(DELIMITER) {
            return Err(StoreError::InvalidObjectKey(path.to_string()));
        }
        if !self.parent_exists(key)? {
            return Err(StoreError::NotFound(format!("parent of {}", key)));
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO entries (path, kind, value) VALUES (?1, ?2, ?3)",
            params![key, KIND_OBJECT, value],
        )?;
        info!("SQLite: wrote {} bytes to {}", value.len(), key);
        Ok(())
    }

    fn read_object(&self, path: &str) -> Result<Option<Bytes>> {
        let key = Self::key(path)?;
        let value: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE path = ?1 AND kind = ?2",
                params![key, KIND_OBJECT],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(Bytes::from))
    }

    fn delete_bucket(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        match self.kind_of(key)? {
            Some(KIND_BUCKET) => {}
            Some(_) => return Err(StoreError::KeyIsObject(key.to_string())),
            None => return Err(StoreError::NotFound(key.to_string())),
        }
        if self.has_children(key)? {
            return Err(StoreError::NotEmpty(key.to_string()));
        }

        self.conn
            .execute("DELETE FROM entries WHERE path = ?1", params![key])?;
        info!("SQLite: deleted bucket {}", key);
        Ok(())
    }

    fn delete_object(&mut self, path: &str) -> Result<()> {
        let key = Self::key(path)?;
        match self.kind_of(key)? {
            Some(KIND_OBJECT) => {}
            Some(_) => return Err(StoreError::KeyIsBucket(key.to_string())),
            None => return Err(StoreError::NotFound(key.to_string())),
        }

        self.conn
            .execute("DELETE FROM entries WHERE path = ?1", params![key])?;
        info!("SQLite: deleted object {}", key);
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }
}
