//! Durable key/value storage in two tiers: an expiring session tier for the
//! bearer token and a long-lived local tier for everything else.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::lock;

pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const AUTH_USER: &str = "auth_user";
    pub const THEME: &str = "app_theme";
    pub const LANGUAGE: &str = "app_language";
    pub const SIDEBAR_COLLAPSED: &str = "app_sidebar_collapsed";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    /// Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str, ttl: Option<TimeDelta>) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(value: &str, ttl: Option<TimeDelta>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        }
    }

    fn live_value(&self, now: DateTime<Utc>) -> Option<String> {
        match self.expires_at {
            Some(expires) if expires <= now => None,
            _ => Some(self.value.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries)
            .get(key)
            .and_then(|e| e.live_value(Utc::now())))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<TimeDelta>) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// A JSON file holding every entry, rewritten on each change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Entry>>,
}

impl FileStore {
    /// Open `path`, starting empty when it does not exist or cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable storage file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, Entry>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries)
            .get(key)
            .and_then(|e| e.live_value(Utc::now())))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<TimeDelta>) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), Entry::new(value, ttl));
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Storage {
    /// Short-lived tier; entries carry an expiry.
    pub session: Arc<dyn KeyValueStore>,
    pub local: Arc<dyn KeyValueStore>,
}

impl Storage {
    /// File-backed tiers under `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            session: Arc::new(FileStore::open(dir.join("session.json"))?),
            local: Arc::new(FileStore::open(dir.join("local.json"))?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            session: Arc::new(MemoryStore::default()),
            local: Arc::new(MemoryStore::default()),
        }
    }
}
