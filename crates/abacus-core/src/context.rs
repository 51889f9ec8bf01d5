//! Per-request identity and processing context.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier attached to every request.
///
/// Generated as a UUIDv7 so identifiers sort by creation time, which
/// keeps log output browsable without extra timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID, e.g. one received from a client header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RequestId> for Uuid {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Mutable state carried through one request's pipeline.
///
/// Handlers record facts about their work here (how many clients an
/// interests lookup touched, which score fields the caller supplied)
/// and the server folds them into the completion log line.
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    started_at: Instant,
    nclients: Option<usize>,
    has: Option<Vec<String>>,
}

impl RequestContext {
    /// Creates a context with a freshly generated request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context around an externally supplied id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            started_at: Instant::now(),
            nclients: None,
            has: None,
        }
    }

    /// The request identifier.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Time spent since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Records how many clients an interests lookup served.
    pub fn set_nclients(&mut self, nclients: usize) {
        self.nclients = Some(nclients);
    }

    /// Client count recorded by the handler, if any.
    #[must_use]
    pub const fn nclients(&self) -> Option<usize> {
        self.nclients
    }

    /// Records which score fields the caller supplied.
    pub fn set_has(&mut self, has: Vec<String>) {
        self.has = Some(has);
    }

    /// Supplied score fields recorded by the handler, if any.
    #[must_use]
    pub fn has(&self) -> Option<&[String]> {
        self.has.as_deref()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
