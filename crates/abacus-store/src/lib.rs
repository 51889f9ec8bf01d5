//! # Abacus Store
//!
//! Key-value store collaborator for the Abacus scoring API.
//!
//! The store front-ends a pluggable [`Backend`] with a write-back
//! record cache:
//!
//! - **Backend**: the persistence seam. [`MemoryBackend`] ships here
//!   for tests and development; deployments implement the trait over
//!   their KV service.
//! - **Cache**: per-instance merge cache of JSON records, flushed to
//!   the backend when it fills up or at shutdown.
//! - **Degradation**: read failures are logged and surfaced as cache
//!   misses so callers keep serving.
//!
//! ## Example
//!
//! ```rust
//! use abacus_store::{MemoryBackend, Store, StoreConfig};
//! use std::sync::Arc;
//!
//! let store = Store::new(Arc::new(MemoryBackend::new()), StoreConfig::default());
//! store.update_cache("uid:abc", serde_json::Map::new());
//! assert!(store.cache_get("uid:abc").is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/abacus-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod backend;
mod store;

pub use backend::{Backend, MemoryBackend, StoreError};
pub use store::{Record, Store, StoreConfig, StoreStats};
