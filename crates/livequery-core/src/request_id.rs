//! Request ID - per-client subscription identifier
//!
//! Request ids are assigned in creation order starting at 1 and are never
//! reused within a client, so sorting by id reproduces subscription order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier tying subscribe requests to the events they produce.
///
/// Serialized as a plain JSON number to match the wire protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// First id handed out by a fresh client
    pub const FIRST: RequestId = RequestId(1);

    /// Create a RequestId from a raw value
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    #[inline]
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// The id that follows this one
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RequestId> for u64 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}
