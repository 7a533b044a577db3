//! LiveQuery client handle
//!
//! The handle is the public face of a connection. All socket work runs on
//! a background worker task; the handle sends it commands over a channel
//! and observes state and events, so no locks guard the connection state.

use crate::connection::state::ClientState;
use crate::connection::subscription::Subscription;
use crate::connection::worker::{ClientCommand, ClientWorker};
use crate::protocol::ClientMessage;
use crate::session::url::validate_server_url;
use livequery_core::{ClientEvent, LiveQueryError, LiveQueryResult, QueryDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Buffer and timing knobs for a client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of the command channel between handle and worker
    pub command_buffer: usize,
    /// Capacity of the outbound message channel per socket
    pub outbound_buffer: usize,
    /// Capacity of the socket event channel
    pub socket_buffer: usize,
    /// Capacity of the client-wide and per-subscription event streams
    pub event_buffer: usize,
    /// Deadline for a single websocket handshake
    pub connect_timeout: Duration,
    /// Delay before the first reconnect attempt
    pub reconnect_base_delay: Duration,
    /// Ceiling for reconnect delays
    pub reconnect_max_delay: Duration,
    /// Random spread applied to reconnect delays (0.0 to 1.0)
    pub reconnect_jitter: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            outbound_buffer: 64,
            socket_buffer: 64,
            event_buffer: 64,
            connect_timeout: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_jitter: 0.25,
        }
    }
}

/// Identity a client presents in its connect handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    /// Websocket URL (`ws://` or `wss://`)
    pub server_url: String,
    /// Application identifier
    pub application_id: String,
    /// JavaScript key, if the application uses one
    pub javascript_key: Option<String>,
    /// Master key; the server prefers it over the JavaScript key
    pub master_key: Option<String>,
    /// Session token of the signed-in user
    pub session_token: Option<String>,
}

impl ConnectionIdentity {
    /// Identity with only the required fields set
    pub fn new(server_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            application_id: application_id.into(),
            javascript_key: None,
            master_key: None,
            session_token: None,
        }
    }

    /// Set the JavaScript key
    pub fn with_javascript_key(mut self, key: impl Into<String>) -> Self {
        self.javascript_key = Some(key.into());
        self
    }

    /// Set the master key
    pub fn with_master_key(mut self, key: impl Into<String>) -> Self {
        self.master_key = Some(key.into());
        self
    }

    /// Set the session token
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// The connect message for this identity
    pub(crate) fn connect_message(&self) -> ClientMessage {
        ClientMessage::Connect {
            application_id: self.application_id.clone(),
            javascript_key: self.javascript_key.clone(),
            master_key: self.master_key.clone(),
            session_token: self.session_token.clone(),
        }
    }
}

/// Handle to a LiveQuery connection.
///
/// Cheap to share behind its `Arc`. The connection itself lives on a
/// worker task that shuts down when the client is closed or the last
/// handle is dropped.
#[derive(Debug)]
pub struct LiveQueryClient {
    identity: ConnectionIdentity,
    commands: mpsc::Sender<ClientCommand>,
    events: broadcast::Sender<ClientEvent>,
    state: watch::Receiver<ClientState>,
}

impl LiveQueryClient {
    /// Create a client with default configuration.
    ///
    /// Must be called within a tokio runtime: the worker task is spawned
    /// immediately. No socket is opened until [`connect`](Self::connect)
    /// or the first [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    /// Returns [`LiveQueryError::InvalidServerUrl`] if the URL is not a
    /// `ws://` or `wss://` URL.
    pub fn new(identity: ConnectionIdentity) -> LiveQueryResult<Arc<Self>> {
        Self::with_config(identity, ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(
        identity: ConnectionIdentity,
        config: ClientConfig,
    ) -> LiveQueryResult<Arc<Self>> {
        validate_server_url(&identity.server_url)?;

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        let (state_tx, state_rx) = watch::channel(ClientState::Closed);

        let worker = ClientWorker::new(
            identity.clone(),
            config,
            command_rx,
            state_tx,
            event_tx.clone(),
        );
        tokio::spawn(worker.run());

        Ok(Arc::new(Self {
            identity,
            commands: command_tx,
            events: event_tx,
            state: state_rx,
        }))
    }

    /// The websocket URL this client connects to
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.identity.server_url
    }

    /// The application id sent on connect
    #[must_use]
    pub fn application_id(&self) -> &str {
        &self.identity.application_id
    }

    /// The JavaScript key sent on connect, if any
    #[must_use]
    pub fn javascript_key(&self) -> Option<&str> {
        self.identity.javascript_key.as_deref()
    }

    /// The master key sent on connect, if any
    #[must_use]
    pub fn master_key(&self) -> Option<&str> {
        self.identity.master_key.as_deref()
    }

    /// The session token captured when this client was constructed
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.identity.session_token.as_deref()
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch stream of state transitions
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Client-wide lifecycle events, starting from the current position
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Open the connection.
    ///
    /// A no-op when a connection is already open or being retried.
    ///
    /// # Errors
    /// Returns [`LiveQueryError::ClientClosed`] after the client closed.
    pub async fn connect(&self) -> LiveQueryResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(ClientCommand::Connect { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| LiveQueryError::ClientClosed)
    }

    /// Subscribe to a query.
    ///
    /// The subscription is registered immediately; the subscribe message
    /// goes out once the connect handshake is acknowledged, and again
    /// after every reconnect. Opens the connection if it is closed.
    ///
    /// # Errors
    /// Returns [`LiveQueryError::ClientClosed`] after the client closed.
    pub async fn subscribe(&self, query: QueryDescriptor) -> LiveQueryResult<Subscription> {
        self.subscribe_inner(query, None).await
    }

    /// Subscribe with a session token scoped to this subscription
    pub async fn subscribe_with_token(
        &self,
        query: QueryDescriptor,
        session_token: impl Into<String>,
    ) -> LiveQueryResult<Subscription> {
        self.subscribe_inner(query, Some(session_token.into())).await
    }

    async fn subscribe_inner(
        &self,
        query: QueryDescriptor,
        session_token: Option<String>,
    ) -> LiveQueryResult<Subscription> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(ClientCommand::Subscribe {
            query,
            session_token,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LiveQueryError::ClientClosed)
    }

    /// Remove a subscription and close its event stream.
    ///
    /// Removing a subscription that is already gone is a no-op.
    ///
    /// # Errors
    /// Returns [`LiveQueryError::ClientClosed`] after the client closed.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> LiveQueryResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(ClientCommand::Unsubscribe {
            request_id: subscription.request_id(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LiveQueryError::ClientClosed)
    }

    /// Close the client.
    ///
    /// Cancels any pending reconnect, closes the socket, and closes every
    /// subscription event stream. Idempotent; closing a closed client
    /// does nothing.
    pub async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ClientCommand::Close { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    async fn send_command(&self, command: ClientCommand) -> LiveQueryResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LiveQueryError::ClientClosed)
    }
}
