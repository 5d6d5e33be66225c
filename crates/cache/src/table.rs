use crate::clock::{duration_ms, Clock};
use crate::error::CacheError;
use crate::kv::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) trait Timestamped {
    fn created_at(&self) -> u64;
}

/// A bounded, TTL-checked map persisted as a single JSON object under one
/// store key. Every failure of the underlying store is logged and absorbed.
pub(crate) struct PersistentTable {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    storage_key: &'static str,
    capacity: usize,
    ttl_ms: u64,
}

impl PersistentTable {
    pub(crate) fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        storage_key: &'static str,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            storage_key,
            capacity,
            ttl_ms: duration_ms(ttl),
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn is_expired(&self, created_at: u64) -> bool {
        self.now_ms().saturating_sub(created_at) > self.ttl_ms
    }

    /// Decodes entry by entry. Broken entries are skipped; they disappear on
    /// the next write. An unreadable store reads as empty.
    pub(crate) async fn load<E: DeserializeOwned>(&self) -> BTreeMap<String, E> {
        self.read().await.unwrap_or_default()
    }

    /// Like [`Self::load`], but `None` when the store itself failed, as
    /// opposed to holding nothing or garbage. Writers must not save over a
    /// record they could not read.
    async fn read<E: DeserializeOwned>(&self) -> Option<BTreeMap<String, E>> {
        let raw = match self.store.get(self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(BTreeMap::new()),
            Err(CacheError::SerializationError(err)) => {
                log::warn!("{} corrupted, treating as empty: {err}", self.storage_key);
                return Some(BTreeMap::new());
            }
            Err(err) => {
                log::warn!("{} unreadable: {err}", self.storage_key);
                return None;
            }
        };
        let serde_json::Value::Object(map) = raw else {
            log::warn!("{} is not a JSON object, treating as empty", self.storage_key);
            return Some(BTreeMap::new());
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match serde_json::from_value::<E>(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(err) => log::warn!("{} entry {key} corrupted: {err}", self.storage_key),
            }
        }
        Some(entries)
    }

    pub(crate) async fn save<E: Serialize>(&self, entries: &BTreeMap<String, E>) {
        let value = match serde_json::to_value(entries) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{} not serializable: {err}", self.storage_key);
                return;
            }
        };
        if let Err(err) = self.store.set(self.storage_key, value).await {
            log::warn!("{} write failed: {err}", self.storage_key);
        }
    }

    /// Returns the live entry for `key`, deleting it when expired.
    pub(crate) async fn get<E>(&self, key: &str) -> Option<E>
    where
        E: Serialize + DeserializeOwned + Timestamped,
    {
        let mut entries = self.read::<E>().await?;
        let created_at = entries.get(key)?.created_at();
        if self.is_expired(created_at) {
            entries.remove(key);
            self.save(&entries).await;
            log::debug!("{} entry {key} expired", self.storage_key);
            return None;
        }
        entries.remove(key)
    }

    /// Inserts or replaces `key`. A new key arriving at capacity evicts the
    /// entry with the oldest creation time first.
    pub(crate) async fn insert<E>(&self, key: &str, entry: E)
    where
        E: Serialize + DeserializeOwned + Timestamped,
    {
        let Some(mut entries) = self.read::<E>().await else {
            log::warn!("{} write of {key} dropped", self.storage_key);
            return;
        };
        if !entries.contains_key(key) {
            while !entries.is_empty() && entries.len() >= self.capacity {
                let Some(oldest) = oldest_key(&entries) else {
                    break;
                };
                entries.remove(&oldest);
                log::debug!("{} evicted {oldest}", self.storage_key);
            }
        }
        entries.insert(key.to_string(), entry);
        self.save(&entries).await;
    }

    pub(crate) async fn retain<E, F>(&self, mut keep: F) -> usize
    where
        E: Serialize + DeserializeOwned,
        F: FnMut(&E) -> bool,
    {
        let Some(mut entries) = self.read::<E>().await else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| keep(entry));
        let removed = before - entries.len();
        if removed > 0 {
            self.save(&entries).await;
        }
        removed
    }

    pub(crate) async fn clear(&self) {
        if let Err(err) = self.store.remove(self.storage_key).await {
            log::warn!("{} clear failed: {err}", self.storage_key);
        }
    }
}

fn oldest_key<E: Timestamped>(entries: &BTreeMap<String, E>) -> Option<String> {
    // BTreeMap iteration is ordered, so ties resolve to the smallest key.
    entries
        .iter()
        .min_by_key(|(_, entry)| entry.created_at())
        .map(|(key, _)| key.clone())
}
