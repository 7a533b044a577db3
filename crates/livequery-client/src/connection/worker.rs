//! Connection worker
//!
//! A single task owns the connection state machine and all subscription
//! bookkeeping. Client handles reach it through the command channel;
//! socket tasks feed epoch-tagged events back in. Subscriptions live in a
//! `BTreeMap` keyed by request id; ids grow monotonically, so iterating
//! the map replays subscriptions in creation order when a connection is
//! (re-)acknowledged.

use crate::connection::backoff::ReconnectBackoff;
use crate::connection::client::{ClientConfig, ConnectionIdentity};
use crate::connection::socket::{spawn_socket, SocketEvent};
use crate::connection::state::ClientState;
use crate::connection::subscription::Subscription;
use crate::protocol::{ClientMessage, ServerMessage};
use livequery_core::{
    ClientEvent, LiveQueryError, QueryDescriptor, RequestId, SubscriptionEvent,
};
use std::collections::BTreeMap;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

/// Commands a client handle sends to its worker
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Connect {
        reply: oneshot::Sender<()>,
    },
    Subscribe {
        query: QueryDescriptor,
        session_token: Option<String>,
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        request_id: RequestId,
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Per-subscription bookkeeping. Dropping an entry closes its stream.
#[derive(Debug)]
struct SubscriptionEntry {
    query: QueryDescriptor,
    session_token: Option<String>,
    events: broadcast::Sender<SubscriptionEvent>,
}

/// The connection state machine, driven by [`run`](Self::run)
pub(crate) struct ClientWorker {
    identity: ConnectionIdentity,
    config: ClientConfig,
    state: ClientState,
    state_tx: watch::Sender<ClientState>,
    client_events: broadcast::Sender<ClientEvent>,
    commands: mpsc::Receiver<ClientCommand>,
    socket_events_tx: mpsc::Sender<SocketEvent>,
    socket_events: mpsc::Receiver<SocketEvent>,
    subscriptions: BTreeMap<RequestId, SubscriptionEntry>,
    next_request_id: RequestId,
    /// Sender into the active socket task, if one exists
    outbound: Option<mpsc::Sender<ClientMessage>>,
    /// Epoch of the active socket; events from older epochs are ignored
    epoch: u64,
    backoff: ReconnectBackoff,
    /// When the next reconnect attempt is due
    reconnect_at: Option<Instant>,
}

impl ClientWorker {
    pub(crate) fn new(
        identity: ConnectionIdentity,
        config: ClientConfig,
        commands: mpsc::Receiver<ClientCommand>,
        state_tx: watch::Sender<ClientState>,
        client_events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let (socket_events_tx, socket_events) = mpsc::channel(config.socket_buffer);
        let backoff = ReconnectBackoff::new(
            config.reconnect_base_delay,
            config.reconnect_max_delay,
            config.reconnect_jitter,
        );
        Self {
            identity,
            config,
            state: ClientState::Closed,
            state_tx,
            client_events,
            commands,
            socket_events_tx,
            socket_events,
            subscriptions: BTreeMap::new(),
            next_request_id: RequestId::FIRST,
            outbound: None,
            epoch: 0,
            backoff,
            reconnect_at: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let reconnect_deadline = self.reconnect_at.unwrap_or_else(Instant::now);
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        // Every handle is gone; nothing can reach this client again
                        self.shutdown("all handles dropped");
                        break;
                    }
                },
                Some(event) = self.socket_events.recv() => {
                    if self.handle_socket_event(event).await {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(reconnect_deadline), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.open_socket();
                }
            }
        }
        tracing::debug!(server_url = %self.identity.server_url, "Connection worker stopped");
    }

    /// Returns `true` when the worker must stop
    async fn handle_command(&mut self, command: ClientCommand) -> bool {
        match command {
            ClientCommand::Connect { reply } => {
                if self.state == ClientState::Closed {
                    self.open_socket();
                }
                let _ = reply.send(());
                false
            }
            ClientCommand::Subscribe {
                query,
                session_token,
                reply,
            } => {
                let request_id = self.next_request_id;
                self.next_request_id = request_id.next();

                let (events_tx, events_rx) = broadcast::channel(self.config.event_buffer);
                let subscription = Subscription::new(request_id, query.clone(), events_rx);
                let entry = SubscriptionEntry {
                    query,
                    session_token,
                    events: events_tx,
                };

                match self.state {
                    ClientState::Connected => self.send_subscribe(request_id, &entry).await,
                    ClientState::Closed => self.open_socket(),
                    // Connecting and Reconnecting: the entry is sent with
                    // the flush that follows the next handshake ack
                    ClientState::Connecting | ClientState::Reconnecting => {}
                }

                self.subscriptions.insert(request_id, entry);
                tracing::debug!(request_id = %request_id, state = %self.state, "Subscription registered");
                let _ = reply.send(subscription);
                false
            }
            ClientCommand::Unsubscribe { request_id, reply } => {
                if self.subscriptions.remove(&request_id).is_some() {
                    if self.state == ClientState::Connected {
                        self.send_message(ClientMessage::unsubscribe(request_id)).await;
                    }
                    tracing::debug!(request_id = %request_id, "Subscription removed");
                } else {
                    tracing::trace!(request_id = %request_id, "Unsubscribe for unknown subscription ignored");
                }
                let _ = reply.send(());
                false
            }
            ClientCommand::Close { reply } => {
                self.shutdown("close requested");
                let _ = reply.send(());
                true
            }
        }
    }

    /// Returns `true` when the worker must stop
    async fn handle_socket_event(&mut self, event: SocketEvent) -> bool {
        if event.epoch() != self.epoch {
            tracing::trace!(
                epoch = event.epoch(),
                current = self.epoch,
                "Ignoring event from superseded socket"
            );
            return false;
        }

        match event {
            SocketEvent::Opened { .. } => {
                tracing::debug!(server_url = %self.identity.server_url, "Socket open, sending connect");
                self.send_message(self.identity.connect_message()).await;
                false
            }
            SocketEvent::Message { message, .. } => self.handle_server_message(message).await,
            SocketEvent::Closed { reason, .. } => {
                self.schedule_reconnect(reason.as_deref().unwrap_or("connection closed"));
                false
            }
            SocketEvent::Failed { error, .. } => {
                self.emit_client_event(ClientEvent::Error(LiveQueryError::Socket(error.clone())));
                self.schedule_reconnect(&error);
                false
            }
        }
    }

    /// Returns `true` when the worker must stop
    async fn handle_server_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Connected { client_id } => {
                self.set_state(ClientState::Connected);
                self.backoff.reset();
                tracing::info!(
                    server_url = %self.identity.server_url,
                    client_id = client_id.as_deref().unwrap_or(""),
                    "LiveQuery connection established"
                );
                self.emit_client_event(ClientEvent::Opened);
                self.flush_subscriptions().await;
                false
            }
            ServerMessage::Subscribed { request_id } => {
                match self.subscriptions.get(&request_id) {
                    Some(entry) => {
                        let _ = entry.events.send(SubscriptionEvent::Opened);
                        tracing::debug!(request_id = %request_id, "Subscription acknowledged");
                    }
                    None => {
                        tracing::debug!(request_id = %request_id, "Ack for unknown subscription");
                    }
                }
                false
            }
            ServerMessage::Unsubscribed { request_id } => {
                tracing::trace!(request_id = %request_id, "Unsubscribe acknowledged");
                false
            }
            ServerMessage::Error {
                code,
                message,
                reconnect,
                request_id,
            } => self.handle_server_error(code, message, reconnect, request_id),
            ServerMessage::Create { request_id, object } => {
                self.dispatch_event(request_id, SubscriptionEvent::Create(object));
                false
            }
            ServerMessage::Enter { request_id, object } => {
                self.dispatch_event(request_id, SubscriptionEvent::Enter(object));
                false
            }
            ServerMessage::Update { request_id, object } => {
                self.dispatch_event(request_id, SubscriptionEvent::Update(object));
                false
            }
            ServerMessage::Leave { request_id, object } => {
                self.dispatch_event(request_id, SubscriptionEvent::Leave(object));
                false
            }
            ServerMessage::Delete { request_id, object } => {
                self.dispatch_event(request_id, SubscriptionEvent::Delete(object));
                false
            }
        }
    }

    /// Returns `true` when the worker must stop
    fn handle_server_error(
        &mut self,
        code: i64,
        message: String,
        reconnect: bool,
        request_id: Option<RequestId>,
    ) -> bool {
        if let Some(request_id) = request_id {
            if let Some(entry) = self.subscriptions.get(&request_id) {
                let _ = entry.events.send(SubscriptionEvent::Error {
                    code,
                    message: message.clone(),
                    recoverable: reconnect,
                });
            }
            if !reconnect {
                // The server dropped this subscription for good
                self.subscriptions.remove(&request_id);
            }
            tracing::warn!(request_id = %request_id, code, error = %message, "Subscription error");
            return false;
        }

        if reconnect {
            // Advisory; when the server follows up by closing the socket,
            // the close event drives the reconnect
            tracing::warn!(code, error = %message, "Recoverable server error");
            self.emit_client_event(ClientEvent::Error(LiveQueryError::Socket(message)));
            return false;
        }

        // The server refused this client outright, usually a bad
        // application id or session token. Retrying cannot help.
        let error = LiveQueryError::AuthenticationRejected {
            code,
            message: message.clone(),
        };
        tracing::error!(code, error = %message, "Connect rejected by server, closing client");
        self.emit_client_event(ClientEvent::Error(error));
        for entry in self.subscriptions.values() {
            let _ = entry.events.send(SubscriptionEvent::Error {
                code,
                message: message.clone(),
                recoverable: false,
            });
        }
        self.shutdown("connect rejected");
        true
    }

    fn dispatch_event(&self, request_id: RequestId, event: SubscriptionEvent) {
        match self.subscriptions.get(&request_id) {
            Some(entry) => {
                tracing::trace!(request_id = %request_id, event = event.name(), "Dispatching event");
                let _ = entry.events.send(event);
            }
            None => {
                tracing::trace!(
                    request_id = %request_id,
                    event = event.name(),
                    "Event for unknown subscription dropped"
                );
            }
        }
    }

    /// Open a fresh socket under a new epoch
    fn open_socket(&mut self) {
        self.epoch += 1;
        if self.state == ClientState::Closed {
            self.set_state(ClientState::Connecting);
        }
        tracing::debug!(
            server_url = %self.identity.server_url,
            epoch = self.epoch,
            "Opening socket"
        );
        self.outbound = Some(spawn_socket(
            self.identity.server_url.clone(),
            self.epoch,
            self.config.connect_timeout,
            self.config.outbound_buffer,
            self.socket_events_tx.clone(),
        ));
    }

    /// Arm the reconnect timer after a lost connection.
    ///
    /// A no-op when an attempt is already scheduled or the client closed.
    fn schedule_reconnect(&mut self, cause: &str) {
        if self.state == ClientState::Closed || self.reconnect_at.is_some() {
            return;
        }
        self.outbound = None;
        self.set_state(ClientState::Reconnecting);
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempt();
        self.reconnect_at = Some(Instant::now() + delay);
        self.emit_client_event(ClientEvent::Reconnecting { attempt });
        tracing::warn!(
            cause,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Connection lost, reconnect scheduled"
        );
    }

    /// Send subscribe messages for every registered subscription, in
    /// request id order. Runs after every handshake ack, which covers
    /// both the initial connect and every reconnect.
    async fn flush_subscriptions(&self) {
        for (request_id, entry) in &self.subscriptions {
            self.send_subscribe(*request_id, entry).await;
        }
    }

    async fn send_subscribe(&self, request_id: RequestId, entry: &SubscriptionEntry) {
        self.send_message(ClientMessage::subscribe(
            request_id,
            entry.query.clone(),
            entry.session_token.clone(),
        ))
        .await;
    }

    async fn send_message(&self, message: ClientMessage) {
        match &self.outbound {
            Some(outbound) => {
                if outbound.send(message).await.is_err() {
                    // The socket died; its Closed or Failed event is in flight
                    tracing::debug!("Outbound channel closed before send");
                }
            }
            None => tracing::debug!(op = message.op(), "No socket, message dropped"),
        }
    }

    fn set_state(&mut self, next: ClientState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
            self.state_tx.send_replace(next);
        }
    }

    fn emit_client_event(&self, event: ClientEvent) {
        // Nobody listening is fine
        let _ = self.client_events.send(event);
    }

    /// Tear everything down: cancel the reconnect timer, close the
    /// socket, and close every subscription stream.
    fn shutdown(&mut self, cause: &str) {
        tracing::info!(server_url = %self.identity.server_url, cause, "Client closing");
        self.reconnect_at = None;
        self.outbound = None;
        self.subscriptions.clear();
        self.set_state(ClientState::Closed);
        self.emit_client_event(ClientEvent::Closed);
    }
}
