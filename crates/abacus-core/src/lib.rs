//! # Abacus Core
//!
//! Request validation engine for the Abacus scoring API.
//!
//! This crate provides the foundational types used throughout Abacus:
//!
//! - [`FieldSpec`] - Per-field validation rule plus required/nullable flags
//! - [`RequestSchema`] - Ordered field schema for one request variant
//! - [`Envelope`] - Top-level request shape, bound before validation
//! - [`RequestContext`] - Per-request context carrying id and handler metrics
//! - [`ApiError`] - Standard error taxonomy with status-code mapping

#![doc(html_root_url = "https://docs.rs/abacus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod field;
pub mod schema;

mod context;
mod envelope;
mod error;

pub use context::{RequestContext, RequestId};
pub use envelope::Envelope;
pub use error::{ApiError, FieldErrors, ResponseEnvelope};
pub use field::{FieldError, FieldRule, FieldSpec, Gender};
pub use schema::{CompositeRule, RequestSchema, RequestSchemaBuilder, SchemaViolation};
