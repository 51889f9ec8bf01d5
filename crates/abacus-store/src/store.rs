//! Write-back record store over a pluggable backend.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::backend::{Backend, StoreError};

/// A stored record: a JSON object keyed by field name.
pub type Record = serde_json::Map<String, Value>;

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Cached entry count that triggers a flush to the backend.
    pub max_cache_entries: usize,
    /// Backend fetch attempts before a read degrades to a miss.
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: 64,
            max_retries: 3,
        }
    }
}

/// Store counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of flushes that wrote at least one record.
    pub flushes: u64,
}

/// Caching record store.
///
/// Writes land in a per-instance cache and merge into existing cached
/// records; the cache flushes to the backend when it reaches
/// [`StoreConfig::max_cache_entries`] and on explicit [`Store::flush`].
/// Reads either go straight to the backend ([`Store::get`], with
/// bounded retries and degradation to a miss) or stay cache-only
/// ([`Store::cache_get`]).
pub struct Store {
    backend: Arc<dyn Backend>,
    cache: RwLock<HashMap<String, Record>>,
    config: StoreConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    flushes: AtomicU64,
}

impl Store {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Reads a raw value from the backend, bypassing the cache.
    ///
    /// Retries up to `max_retries` times, then degrades: the failure
    /// is logged and the caller sees a miss. Callers that can fall
    /// back to computed data stay available through backend outages.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        for attempt in 1..=self.config.max_retries {
            match self.backend.fetch(key) {
                Ok(value) => return value,
                Err(error) => {
                    tracing::warn!(
                        "Store fetch for {} failed (attempt {}/{}): {}",
                        key,
                        attempt,
                        self.config.max_retries,
                        error
                    );
                }
            }
        }
        tracing::warn!(
            "Store fetch for {} gave up after {} attempts, treating as miss",
            key,
            self.config.max_retries
        );
        None
    }

    /// Reads a record from the cache. Never touches the backend.
    #[must_use]
    pub fn cache_get(&self, key: &str) -> Option<Record> {
        let cached = self.cache.read().unwrap().get(key).cloned();
        match cached {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Merges `record` into the cached entry for `key`.
    ///
    /// Fields present in `record` override the cached ones; other
    /// cached fields are preserved. When the cache reaches
    /// `max_cache_entries` afterwards it is flushed to the backend.
    pub fn update_cache(&self, key: &str, record: Record) {
        let should_flush = {
            let mut cache = self.cache.write().unwrap();
            match cache.entry(key.to_owned()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    for (field, value) in record {
                        existing.insert(field, value);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
            cache.len() >= self.config.max_cache_entries
        };

        if should_flush {
            self.flush();
        }
    }

    /// Writes every cached record to the backend and clears the cache.
    ///
    /// Each record is merged into whatever the backend already holds
    /// under its key, with the cached fields overriding. A failure for
    /// one key is logged and does not abort the remaining keys.
    pub fn flush(&self) {
        let drained: Vec<(String, Record)> = {
            let mut cache = self.cache.write().unwrap();
            cache.drain().collect()
        };
        if drained.is_empty() {
            return;
        }

        for (key, record) in drained {
            if let Err(error) = self.persist_merged(&key, record) {
                tracing::warn!("Failed to flush record {}: {}", key, error);
            }
        }
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of records currently cached.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    /// Snapshot of the store counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    fn persist_merged(&self, key: &str, record: Record) -> Result<(), StoreError> {
        let mut merged = match self.backend.fetch(key)? {
            Some(raw) => serde_json::from_str::<Record>(&raw).unwrap_or_else(|error| {
                tracing::warn!("Replacing unreadable record {}: {}", key, error);
                Record::new()
            }),
            None => Record::new(),
        };
        for (field, value) in record {
            merged.insert(field, value);
        }

        let serialized =
            serde_json::to_string(&merged).map_err(|error| StoreError::Serialization {
                message: error.to_string(),
            })?;
        self.backend.persist(key, serialized)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("cached_entries", &self.cache_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn memory_store(config: StoreConfig) -> (Arc<MemoryBackend>, Store) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::new(backend.clone(), config);
        (backend, store)
    }

    /// Sequential merge steps applied to one record, with the cached
    /// state expected after each.
    fn merge_steps() -> Vec<(Value, Value)> {
        vec![
            (json!({"score": 5.0}), json!({"score": 5.0})),
            (json!({"score": 5.0}), json!({"score": 5.0})),
            (
                json!({"1": ["cinema", "tv"], "2": ["cinema", "hi-tech"], "3": ["hi-tech", "books"]}),
                json!({"score": 5.0, "1": ["cinema", "tv"], "2": ["cinema", "hi-tech"], "3": ["hi-tech", "books"]}),
            ),
            (
                json!({"score": 12.0}),
                json!({"score": 12.0, "1": ["cinema", "tv"], "2": ["cinema", "hi-tech"], "3": ["hi-tech", "books"]}),
            ),
            (
                json!({"1": ["cinema", "tv"], "2": ["it", "hi-tech"]}),
                json!({"score": 12.0, "1": ["cinema", "tv"], "2": ["it", "hi-tech"], "3": ["hi-tech", "books"]}),
            ),
            (
                json!({"50": ["travel", "pets"], "2": ["it", "hi-tech"]}),
                json!({"score": 12.0, "1": ["cinema", "tv"], "2": ["it", "hi-tech"], "3": ["hi-tech", "books"], "50": ["travel", "pets"]}),
            ),
        ]
    }

    #[test]
    fn test_update_cache_merges_sequentially() {
        let (_, store) = memory_store(StoreConfig::default());

        for (update, expected) in merge_steps() {
            store.update_cache("test_account", record(update));
            assert_eq!(store.cache_get("test_account"), Some(record(expected)));
        }
    }

    #[test]
    fn test_flushed_records_merge_in_the_backend() {
        // Threshold of one turns every update into a write-through.
        let (_, store) = memory_store(StoreConfig {
            max_cache_entries: 1,
            max_retries: 3,
        });

        for (update, expected) in merge_steps() {
            store.update_cache("test_account", record(update));
            let raw = store.get("test_account").unwrap();
            let persisted: Record = serde_json::from_str(&raw).unwrap();
            assert_eq!(persisted, record(expected));
        }
        assert_eq!(store.cache_len(), 0);
    }

    #[test]
    fn test_cache_flushes_at_threshold() {
        let (backend, store) = memory_store(StoreConfig {
            max_cache_entries: 2,
            max_retries: 3,
        });

        store.update_cache("a", record(json!({"x": 1})));
        assert_eq!(store.cache_len(), 1);
        assert!(backend.is_empty());

        store.update_cache("b", record(json!({"y": 2})));
        assert_eq!(store.cache_len(), 0);
        assert_eq!(backend.len(), 2);
        assert_eq!(store.stats().flushes, 1);
    }

    #[test]
    fn test_flush_merges_against_persisted_record() {
        let (backend, store) = memory_store(StoreConfig::default());
        backend
            .persist("k", json!({"a": 1, "b": 2}).to_string())
            .unwrap();

        store.update_cache("k", record(json!({"b": 3, "c": 4})));
        store.flush();

        let raw = backend.fetch("k").unwrap().unwrap();
        let persisted: Record = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, record(json!({"a": 1, "b": 3, "c": 4})));
    }

    #[test]
    fn test_unreadable_persisted_record_is_replaced() {
        let (backend, store) = memory_store(StoreConfig::default());
        backend.persist("k", "not-json".to_owned()).unwrap();

        store.update_cache("k", record(json!({"score": 1.5})));
        store.flush();

        let raw = backend.fetch("k").unwrap().unwrap();
        let persisted: Record = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, record(json!({"score": 1.5})));
    }

    #[test]
    fn test_flush_of_empty_cache_is_a_noop() {
        let (backend, store) = memory_store(StoreConfig::default());
        store.flush();
        assert!(backend.is_empty());
        assert_eq!(store.stats().flushes, 0);
    }

    #[test]
    fn test_get_reads_backend_not_cache() {
        let (_, store) = memory_store(StoreConfig::default());
        store.update_cache("k", record(json!({"score": 3.0})));

        assert_eq!(store.get("k"), None);
        assert!(store.cache_get("k").is_some());
    }

    #[test]
    fn test_cache_get_tracks_hits_and_misses() {
        let (_, store) = memory_store(StoreConfig::default());

        assert!(store.cache_get("k").is_none());
        store.update_cache("k", record(json!({"score": 3.0})));
        assert!(store.cache_get("k").is_some());

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    struct FailingBackend {
        fetches: AtomicU64,
    }

    impl FailingBackend {
        fn new() -> Self {
            Self {
                fetches: AtomicU64::new(0),
            }
        }
    }

    impl Backend for FailingBackend {
        fn fetch(&self, _key: &str) -> Result<Option<String>, StoreError> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            Err(StoreError::unavailable("connection refused"))
        }

        fn persist(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    #[test]
    fn test_get_degrades_to_miss_after_retries() {
        let backend = Arc::new(FailingBackend::new());
        let store = Store::new(backend.clone(), StoreConfig::default());

        assert_eq!(store.get("k"), None);
        assert_eq!(backend.fetches.load(Ordering::Relaxed), 3);
    }

    /// Fails persistence for one key, accepts everything else.
    struct PickyBackend {
        inner: MemoryBackend,
        rejected: String,
    }

    impl Backend for PickyBackend {
        fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.fetch(key)
        }

        fn persist(&self, key: &str, value: String) -> Result<(), StoreError> {
            if key == self.rejected {
                return Err(StoreError::unavailable("write refused"));
            }
            self.inner.persist(key, value)
        }
    }

    #[test]
    fn test_flush_failure_does_not_abort_other_keys() {
        let backend = Arc::new(PickyBackend {
            inner: MemoryBackend::new(),
            rejected: "bad".to_owned(),
        });
        let store = Store::new(backend.clone(), StoreConfig::default());

        store.update_cache("good", record(json!({"x": 1})));
        store.update_cache("bad", record(json!({"y": 2})));
        store.flush();

        assert_eq!(store.cache_len(), 0);
        assert!(backend.fetch("good").unwrap().is_some());
        assert!(backend.fetch("bad").unwrap().is_none());
    }
}
