//! # Abacus Server
//!
//! HTTP scoring API server: one `POST /method` endpoint carrying a JSON
//! envelope, dispatched through a fixed pipeline.
//!
//! # Request pipeline
//!
//! ```text
//! POST /method
//!     │
//!     ▼
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────┐
//! │   bind    │ → │  resolve  │ → │  validate  │ → │ authenticate │ → │ handle  │
//! │ envelope  │   │  method   │   │ arguments  │   │    token     │   │ request │
//! └───────────┘   └───────────┘   └────────────┘   └──────────────┘   └─────────┘
//!      422             422             422               403             200
//! ```
//!
//! The first failing stage wins; a request that is both invalid and
//! unauthenticated reports the validation errors.
//!
//! # Features
//!
//! - **Methods**: `online_score` (additive score, cached through the
//!   store) and `clients_interests` (per-client interest lists).
//! - **Validation**: ordered schemas with typed field rules and a
//!   composite at-least-one-pair rule, from `abacus-core`.
//! - **Authentication**: SHA-512 token digests compared in constant
//!   time, with an hour-stamped admin digest.
//! - **Store**: write-back record cache over a pluggable backend, from
//!   `abacus-store`; reads degrade to misses on outage.
//! - **Transport**: hyper http1 with graceful shutdown, request ids and
//!   structured completion logs.
//!
//! # Example Usage
//!
//! ```bash
//! # Run with a configuration file
//! $ abacus-server --config /etc/abacus/server.toml
//!
//! # Run with environment variable overrides
//! $ ABACUS_HTTP_ADDR=0.0.0.0:9090 ABACUS_LOG_LEVEL=debug abacus-server
//! ```

#![doc(html_root_url = "https://docs.rs/abacus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod logging;
pub mod scoring;
pub mod server;
pub mod shutdown;

pub use config::AppConfig;
pub use dispatch::Dispatcher;
pub use server::{ApiServer, ServerConfig};
pub use shutdown::ShutdownSignal;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
