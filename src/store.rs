//! Key-value storage contract and an in-memory implementation

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Options for a single write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Lifetime of the value in seconds; `None` keeps it forever
    pub expiration_ttl: Option<u64>,
}

impl PutOptions {
    #[must_use]
    pub const fn with_ttl(seconds: u64) -> Self {
        Self {
            expiration_ttl: Some(seconds),
        }
    }
}

/// String key-value store used for records, inbox indexes and code entries
///
/// Implementations decide their own consistency model; callers must not
/// assume read-modify-write sequences are atomic.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local store backed by a `HashMap`; expired values read as absent
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, key: &str) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|e| IngestError::storage(key, e))
    }

    /// Number of live keys
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys starting with `prefix`, sorted
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Utc::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Expiry instant of a key, if it has one
    #[must_use]
    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).and_then(|e| e.expires_at))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        let mut entries = self.lock(key)?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<()> {
        let expires_at = match options.expiration_ttl {
            Some(ttl) => Some(
                i64::try_from(ttl)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| {
                        IngestError::storage(key, format!("TTL of {ttl}s is out of range"))
                    })?,
            ),
            None => None,
        };
        self.lock(key)?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock(key)?.remove(key);
        Ok(())
    }
}
