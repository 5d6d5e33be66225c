//! # Fieldmatch Cache
//!
//! Device-local caches of confirmed matches, persisted through the host's
//! key-value store.
//!
//! - [`LocalCacheTier`]: field signature → profile key, bounded, 7-day TTL,
//!   oldest-first eviction.
//! - [`BatchCache`]: (form signature, profile signature) → every field's
//!   result, so a revisited form resolves without any network call.
//!
//! Neither tier ever returns an error: a store that cannot be read is a miss,
//! a write that fails is dropped.

mod batch;
mod clock;
mod error;
mod kv;
mod local;
mod table;

pub use batch::{BatchCache, BatchCacheEntry, BATCH_CACHE_KEY};
pub use clock::{unix_ms_now, Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use local::{CacheEntry, LocalCacheTier, TierSettings, LOCAL_CACHE_KEY};
