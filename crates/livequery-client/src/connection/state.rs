//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a LiveQuery connection.
///
/// `Closed` is both the initial state and the terminal state after an
/// explicit close or a non-recoverable rejection. A lost connection moves
/// to `Reconnecting` and stays there across attempts until the handshake
/// is re-acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    /// No socket and no reconnect pending
    #[default]
    Closed,
    /// First connection attempt and handshake in flight
    Connecting,
    /// Handshake acknowledged, traffic flows
    Connected,
    /// Connection lost, retrying
    Reconnecting,
}

impl ClientState {
    /// State name as a lowercase string
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Check whether the handshake completed and messages can be sent
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check whether this is the idle or terminal state
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
