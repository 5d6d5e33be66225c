use crate::clock::Clock;
use crate::kv::KeyValueStore;
use crate::local::TierSettings;
use crate::table::{PersistentTable, Timestamped};
use fieldmatch_protocol::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

pub const BATCH_CACHE_KEY: &str = "fieldmatch.batch_cache";

/// All results of one form resolution. The form signature embeds a day bucket,
/// so the key itself rotates daily on top of the TTL check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCacheEntry {
    pub form_signature: String,
    pub profile_signature: String,
    /// Field signature of every index at store time. The form signature does
    /// not depend on field order, so a hit may come from a reordered form.
    #[serde(default)]
    pub field_signatures: Vec<String>,
    pub results: BTreeMap<usize, MatchResult>,
    pub created_at: u64,
}

impl BatchCacheEntry {
    /// Results re-keyed to the current field order. Each current field takes
    /// the first unused stored index with the same field signature; entries
    /// without signatures map index to index.
    pub fn results_for(mut self, field_signatures: &[String]) -> BTreeMap<usize, MatchResult> {
        if self.field_signatures.len() != field_signatures.len() {
            return self.results;
        }
        let mut slots: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (index, signature) in self.field_signatures.iter().enumerate() {
            slots.entry(signature.as_str()).or_default().push_back(index);
        }
        let mut remapped = BTreeMap::new();
        for (index, signature) in field_signatures.iter().enumerate() {
            let stored = slots
                .get_mut(signature.as_str())
                .and_then(VecDeque::pop_front);
            if let Some(result) = stored.and_then(|stored| self.results.remove(&stored)) {
                remapped.insert(index, result);
            }
        }
        remapped
    }
}

impl Timestamped for BatchCacheEntry {
    fn created_at(&self) -> u64 {
        self.created_at
    }
}

/// Form-level cache keyed by `(form signature, profile signature)`.
pub struct BatchCache {
    table: PersistentTable,
}

impl BatchCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, settings: TierSettings) -> Self {
        Self {
            table: PersistentTable::new(
                store,
                clock,
                BATCH_CACHE_KEY,
                settings.capacity,
                settings.ttl,
            ),
        }
    }

    pub async fn get(&self, form_signature: &str, profile_signature: &str) -> Option<BatchCacheEntry> {
        self.table
            .get::<BatchCacheEntry>(&entry_key(form_signature, profile_signature))
            .await
    }

    pub async fn put(
        &self,
        form_signature: &str,
        profile_signature: &str,
        field_signatures: Vec<String>,
        results: BTreeMap<usize, MatchResult>,
    ) {
        let entry = BatchCacheEntry {
            form_signature: form_signature.to_string(),
            profile_signature: profile_signature.to_string(),
            field_signatures,
            results,
            created_at: self.table.now_ms(),
        };
        self.table
            .insert(&entry_key(form_signature, profile_signature), entry)
            .await;
    }

    pub async fn clear(&self) {
        self.table.clear().await;
    }

    pub async fn len(&self) -> usize {
        self.table.load::<BatchCacheEntry>().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn entry_key(form_signature: &str, profile_signature: &str) -> String {
    format!("{form_signature}:{profile_signature}")
}
