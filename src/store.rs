//! Durable key-value persistence for accounts and the active session.
//!
//! The store sees whole values only: every write replaces the value under a
//! key, there are no partial-field updates. Layout:
//!
//! | key               | value                                  |
//! |-------------------|----------------------------------------|
//! | `user:{username}` | [`UserAccount`] as JSON                |
//! | `session`         | the active username, as a JSON string  |

use crate::error::FintracksError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key holding the active username.
pub const SESSION_KEY: &str = "session";

/// Key holding `username`'s account record.
pub fn account_key(username: &str) -> String {
    format!("user:{}", username)
}

/// One user's durable record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    /// SHA-256 hex digest; see [`crate::auth::hash_password`].
    pub password_hash: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub custom_categories: Vec<String>,
}

/// Whole-value get/set/remove over string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, FintracksError>;
    fn set(&self, key: &str, value: &str) -> Result<(), FintracksError>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), FintracksError>;
}

/// Read and deserialise the JSON value under `key`.
pub fn get_json<T: for<'de> Deserialize<'de>>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, FintracksError> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| storage_error(key, format!("corrupt value: {e}"))),
    }
}

/// Serialise `value` to JSON and store it under `key`.
pub fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), FintracksError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| storage_error(key, format!("serialisation failed: {e}")))?;
    store.set(key, &raw)
}

pub fn load_account(
    store: &dyn KeyValueStore,
    username: &str,
) -> Result<Option<UserAccount>, FintracksError> {
    get_json(store, &account_key(username))
}

pub fn save_account(store: &dyn KeyValueStore, account: &UserAccount) -> Result<(), FintracksError> {
    set_json(store, &account_key(&account.username), account)
}

fn storage_error(key: &str, detail: impl Into<String>) -> FintracksError {
    FintracksError::Storage {
        key: key.to_string(),
        detail: detail.into(),
    }
}

// ── In-memory store ──────────────────────────────────────────────────────

/// Ephemeral store; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, FintracksError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| storage_error(key, "store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FintracksError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| storage_error(key, "store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FintracksError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| storage_error(key, "store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

// ── File-backed store ────────────────────────────────────────────────────

/// One file per key under a directory.
///
/// File names are the hex encoding of the key plus `.json`, so any key maps
/// to a valid, collision-free name. Writes go to a temp file in the same
/// directory and are renamed into place, so a crash never leaves a
/// half-written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FintracksError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| storage_error("*", format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, FintracksError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key, e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FintracksError> {
        let path = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| storage_error(key, format!("tempfile: {e}")))?;
        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| storage_error(key, format!("write: {e}")))?;
        tmp.persist(&path)
            .map_err(|e| storage_error(key, format!("rename: {}", e.error)))?;
        debug!("Stored '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FintracksError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(key, e.to_string())),
        }
    }
}
