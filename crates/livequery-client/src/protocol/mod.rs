//! Wire protocol types

mod messages;

pub use messages::{ClientMessage, ServerMessage};
