use crate::clock::Clock;
use crate::kv::KeyValueStore;
use crate::table::{PersistentTable, Timestamped};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const LOCAL_CACHE_KEY: &str = "fieldmatch.local_cache";

/// A confirmed field → profile key mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub field_signature: String,
    pub matched_key: String,
    pub confidence: u8,
    /// Unix milliseconds.
    pub created_at: u64,
}

impl Timestamped for CacheEntry {
    fn created_at(&self) -> u64 {
        self.created_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSettings {
    pub capacity: usize,
    pub ttl: Duration,
    /// Matches below this confidence are never stored.
    pub min_confidence: u8,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            min_confidence: 80,
        }
    }
}

/// Device-scoped cache of field signature → matched key.
///
/// Best effort throughout: store failures read as misses and writes that fail
/// are dropped after a warning.
pub struct LocalCacheTier {
    table: PersistentTable,
    min_confidence: u8,
}

impl LocalCacheTier {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, settings: TierSettings) -> Self {
        Self {
            table: PersistentTable::new(
                store,
                clock,
                LOCAL_CACHE_KEY,
                settings.capacity,
                settings.ttl,
            ),
            min_confidence: settings.min_confidence,
        }
    }

    pub async fn get(&self, signature: &str) -> Option<CacheEntry> {
        self.table.get::<CacheEntry>(signature).await
    }

    pub async fn set(&self, signature: &str, matched_key: &str, confidence: u8) {
        if confidence < self.min_confidence {
            log::debug!(
                "local cache: not storing {signature} -> {matched_key} at confidence {confidence}"
            );
            return;
        }
        let entry = CacheEntry {
            field_signature: signature.to_string(),
            matched_key: matched_key.to_string(),
            confidence,
            created_at: self.table.now_ms(),
        };
        self.table.insert(signature, entry).await;
    }

    /// Drops every mapping onto `matched_key`, e.g. after the profile key was
    /// renamed or deleted. Returns how many entries were removed.
    pub async fn invalidate_by_key(&self, matched_key: &str) -> usize {
        self.table
            .retain::<CacheEntry, _>(|entry| entry.matched_key != matched_key)
            .await
    }

    pub async fn remove(&self, signature: &str) -> usize {
        self.table
            .retain::<CacheEntry, _>(|entry| entry.field_signature != signature)
            .await
    }

    pub async fn clear(&self) {
        self.table.clear().await;
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.table.load::<CacheEntry>().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
