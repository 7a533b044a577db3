//! # livequery-core
//!
//! Domain layer for the LiveQuery client: query descriptors, request ids,
//! event unions, and error types. This crate has no dependency on the
//! websocket transport or the async runtime.

pub mod error;
pub mod events;
pub mod query;
pub mod request_id;

// Re-export commonly used types at crate root
pub use error::{LiveQueryError, LiveQueryResult};
pub use events::{ClientEvent, SubscriptionEvent};
pub use query::QueryDescriptor;
pub use request_id::RequestId;
