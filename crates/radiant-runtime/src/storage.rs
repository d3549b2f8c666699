#![forbid(unsafe_code)]

//! Prefix-scoped views over a persistent key/value store.
//!
//! # Design
//!
//! Every [`StorageNamespace`] shares one backing [`KeyValueStore`] and owns a
//! prefix. Partitioning is purely by key: the store itself knows nothing
//! about namespaces, and access is single-threaded so no locking is needed.
//!
//! Keys are stored as `prefix + escape(key)`. Prefixes always end with
//! [`SEPARATOR`], and escaping removes the separator from keys, so no key of
//! one namespace can ever spell a key of another, nested prefixes included.
//! Keys without `.` or `%` are stored verbatim.
//!
//! # Backends
//!
//! - [`MemoryStore`]: lives as long as the session (the `sessionStorage`
//!   analogue).
//! - [`FileStore`]: a JSON object on disk, rewritten through a temporary file
//!   (fsynced) and an atomic rename on every mutation. The in-memory view
//!   only changes once the write has landed, so a failed mutation leaves
//!   memory and disk agreeing on the previous contents.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::StorageError;

/// Terminator of every namespace prefix.
pub const SEPARATOR: char = '.';

/// A flat string-to-string store shared by all namespaces.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Every key, sorted.
    fn keys(&self) -> Vec<String>;
}

/// In-memory store for session-lifetime state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry, across all namespaces.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

/// Durable store kept as a JSON object in a single file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open `path`, loading existing entries. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StorageError::Json {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened file store");
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` to disk (temp + fsync + rename), then adopt them.
    fn commit(&self, entries: BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        let text = serde_json::to_string_pretty(&entries).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(text.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        *self.entries.borrow_mut() = entries;

        #[cfg(unix)]
        {
            let dir = parent.unwrap_or(Path::new("."));
            if let Err(err) = fs::File::open(dir).and_then(|dir| dir.sync_all()) {
                tracing::warn!(path = %self.path.display(), error = %err, "directory sync failed");
            }
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.entries.borrow().get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        let mut next = self.entries.borrow().clone();
        next.insert(key.to_owned(), value.to_owned());
        self.commit(next)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.entries.borrow().contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.borrow().clone();
        next.remove(key);
        self.commit(next)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2E"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_key(stored: &str) -> String {
    stored.replace("%2E", ".").replace("%25", "%")
}

/// A prefix-scoped view over a shared [`KeyValueStore`].
#[derive(Clone)]
pub struct StorageNamespace {
    store: Rc<dyn KeyValueStore>,
    prefix: String,
}

impl fmt::Debug for StorageNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageNamespace")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl StorageNamespace {
    /// Scope `store` to `prefix`. A separator is appended if missing.
    #[must_use]
    pub fn new(store: Rc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with(SEPARATOR) {
            prefix.push(SEPARATOR);
        }
        Self { store, prefix }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, escape_key(key))
    }

    /// Stored value, or `None` if `key` was never set.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.store.get(&self.full_key(key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let full = self.full_key(key);
        debug!(key = %full, "storage write");
        self.store.set(&full, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(&self.full_key(key))
    }

    /// Keys set in this namespace (not in nested ones), sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|full| {
                let rest = full.strip_prefix(&self.prefix)?;
                (!rest.contains(SEPARATOR)).then(|| unescape_key(rest))
            })
            .collect()
    }

    /// Remove every key of this namespace. Nested namespaces are untouched.
    pub fn clear(&self) -> Result<(), StorageError> {
        for key in self.keys() {
            self.remove_item(&key)?;
        }
        Ok(())
    }

    /// Namespace nested under this one.
    #[must_use]
    pub fn child(&self, name: &str) -> StorageNamespace {
        Self::new(
            Rc::clone(&self.store),
            format!("{}{}", self.prefix, escape_key(name)),
        )
    }
}
