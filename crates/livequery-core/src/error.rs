//! Error types shared across the LiveQuery crates

use thiserror::Error;

/// Result alias for LiveQuery operations
pub type LiveQueryResult<T> = Result<T, LiveQueryError>;

/// Errors surfaced by LiveQuery clients and the session controller.
///
/// The enum is `Clone` because a single construction failure can be
/// observed by every caller that coalesced onto the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveQueryError {
    /// The configured server URL is missing or not a `ws`/`wss` URL.
    #[error("You need to set a proper Parse LiveQuery server url before using LiveQueryClient")]
    InvalidServerUrl,

    /// The server refused the connect handshake and forbade retrying.
    #[error("Connect rejected by server: {message} (code {code})")]
    AuthenticationRejected { code: i64, message: String },

    /// The client was closed and accepts no further operations.
    #[error("LiveQuery client is closed")]
    ClientClosed,

    /// A transport-level failure. These are absorbed by the reconnect
    /// loop and only reported through the client event stream.
    #[error("Socket error: {0}")]
    Socket(String),
}

impl LiveQueryError {
    /// Check if the client keeps running after reporting this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Socket(_))
    }
}
