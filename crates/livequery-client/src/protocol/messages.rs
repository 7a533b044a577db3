//! LiveQuery wire format
//!
//! Defines the JSON messages exchanged with the server. Every message is
//! an object tagged by its `op` field; payload keys are camelCase.

use livequery_core::{QueryDescriptor, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from the client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Handshake carrying the client identity
    Connect {
        #[serde(rename = "applicationId")]
        application_id: String,

        #[serde(rename = "javascriptKey", skip_serializing_if = "Option::is_none", default)]
        javascript_key: Option<String>,

        #[serde(rename = "masterKey", skip_serializing_if = "Option::is_none", default)]
        master_key: Option<String>,

        #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none", default)]
        session_token: Option<String>,
    },

    /// Register a query under a request id
    Subscribe {
        #[serde(rename = "requestId")]
        request_id: RequestId,

        query: QueryDescriptor,

        #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none", default)]
        session_token: Option<String>,
    },

    /// Remove the subscription registered under a request id
    Unsubscribe {
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },
}

impl ClientMessage {
    /// Create a Subscribe message
    #[must_use]
    pub fn subscribe(
        request_id: RequestId,
        query: QueryDescriptor,
        session_token: Option<String>,
    ) -> Self {
        Self::Subscribe {
            request_id,
            query,
            session_token,
        }
    }

    /// Create an Unsubscribe message
    #[must_use]
    pub fn unsubscribe(request_id: RequestId) -> Self {
        Self::Unsubscribe { request_id }
    }

    /// The `op` tag of this message
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Messages sent from the server to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The connect handshake was accepted
    Connected {
        #[serde(rename = "clientId", skip_serializing_if = "Option::is_none", default)]
        client_id: Option<String>,
    },

    /// A subscribe request was accepted
    Subscribed {
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },

    /// An unsubscribe request was processed
    Unsubscribed {
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },

    /// An error, either client-wide or scoped to one subscription.
    /// `reconnect: false` means the condition is permanent.
    Error {
        code: i64,

        #[serde(rename = "error")]
        message: String,

        #[serde(default)]
        reconnect: bool,

        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none", default)]
        request_id: Option<RequestId>,
    },

    /// An object started matching a subscribed query
    Create {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        object: Value,
    },

    /// An object changed and entered the result set
    Enter {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        object: Value,
    },

    /// A matching object changed
    Update {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        object: Value,
    },

    /// An object changed and left the result set
    Leave {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        object: Value,
    },

    /// A matching object was deleted
    Delete {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        object: Value,
    },
}

impl ServerMessage {
    /// The `op` tag of this message
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Error { .. } => "error",
            Self::Create { .. } => "create",
            Self::Enter { .. } => "enter",
            Self::Update { .. } => "update",
            Self::Leave { .. } => "leave",
            Self::Delete { .. } => "delete",
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
