//! # livequery-client
//!
//! WebSocket client for Parse-style LiveQuery subscriptions: the
//! connection state machine with automatic re-subscription, and the
//! session controller that lazily caches a default client per process.

pub mod connection;
pub mod protocol;
pub mod session;

pub use connection::{
    ClientConfig, ClientState, ConnectionIdentity, LiveQueryClient, Subscription,
};
pub use session::{resolve_server_url, validate_server_url, LiveQueryController};

// Re-export the domain types callers interact with
pub use livequery_core::{
    ClientEvent, LiveQueryError, LiveQueryResult, QueryDescriptor, RequestId, SubscriptionEvent,
};
