//! Persistence seam for the store.

use std::collections::HashMap;
use std::sync::RwLock;

/// Errors surfaced by a [`Backend`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing service could not be reached or answered abnormally.
    #[error("store backend unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A record could not be serialized for persistence.
    #[error("record serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an [`Unavailable`](StoreError::Unavailable) error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Raw string key-value persistence.
///
/// Implementations must be safe to share across request tasks. Retry
/// and reconnect policy for a networked service belongs inside the
/// implementation; the [`Store`](crate::Store) only re-invokes `fetch`
/// a bounded number of times before degrading.
pub trait Backend: Send + Sync {
    /// Fetches the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the backing service
    /// cannot answer.
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Persists `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the backing service
    /// cannot accept the write.
    fn persist(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-process [`Backend`] over a hash map.
///
/// Used by the test suites and the development server. Never fails.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` when nothing has been persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn persist(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().unwrap().insert(key.to_owned(), value);
        Ok(())
    }
}
