//! Connection management

pub mod backoff;
pub mod client;
mod socket;
pub mod state;
pub mod subscription;
mod worker;

pub use backoff::ReconnectBackoff;
pub use client::{ClientConfig, ConnectionIdentity, LiveQueryClient};
pub use state::ClientState;
pub use subscription::Subscription;
