//! Event unions delivered to client and subscription listeners

use crate::error::LiveQueryError;
use serde_json::Value;

/// Lifecycle events emitted on the client-wide stream
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connect handshake was acknowledged by the server
    Opened,
    /// The connection dropped and a reconnect attempt is scheduled
    Reconnecting { attempt: u32 },
    /// An error was reported; recoverable errors do not stop the client
    Error(LiveQueryError),
    /// The client reached its terminal state
    Closed,
}

impl ClientEvent {
    /// Name under which this event is dispatched to listeners
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "open",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Error(_) => "error",
            Self::Closed => "close",
        }
    }
}

/// Events delivered to the listeners of a single subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The server acknowledged the subscribe request
    Opened,
    /// An object started matching the query
    Create(Value),
    /// An existing object changed and now matches the query
    Enter(Value),
    /// A matching object changed and still matches
    Update(Value),
    /// A matching object changed and no longer matches
    Leave(Value),
    /// A matching object was deleted
    Delete(Value),
    /// The server reported an error scoped to this subscription
    Error {
        code: i64,
        message: String,
        recoverable: bool,
    },
}

impl SubscriptionEvent {
    /// Name under which this event is dispatched to listeners
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "open",
            Self::Create(_) => "create",
            Self::Enter(_) => "enter",
            Self::Update(_) => "update",
            Self::Leave(_) => "leave",
            Self::Delete(_) => "delete",
            Self::Error { .. } => "error",
        }
    }

    /// The object payload, for the variants that carry one
    pub fn object(&self) -> Option<&Value> {
        match self {
            Self::Create(object)
            | Self::Enter(object)
            | Self::Update(object)
            | Self::Leave(object)
            | Self::Delete(object) => Some(object),
            Self::Opened | Self::Error { .. } => None,
        }
    }
}
