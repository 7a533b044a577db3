//! Socket task
//!
//! Owns a single websocket connection attempt. Every attempt carries an
//! epoch number; the worker drops events from superseded attempts, so a
//! lingering socket from before a reconnect cannot corrupt the state
//! machine.

use crate::protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Events a socket task reports to its worker.
///
/// A task emits at most one `Opened`, then any number of `Message`
/// events, and terminates with exactly one `Closed` or `Failed`.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    /// The websocket handshake completed
    Opened { epoch: u64 },
    /// A protocol message arrived
    Message { epoch: u64, message: ServerMessage },
    /// The peer closed the connection or the stream ended
    Closed { epoch: u64, reason: Option<String> },
    /// The connection attempt or the transport failed
    Failed { epoch: u64, error: String },
}

impl SocketEvent {
    pub(crate) fn epoch(&self) -> u64 {
        match self {
            Self::Opened { epoch }
            | Self::Message { epoch, .. }
            | Self::Closed { epoch, .. }
            | Self::Failed { epoch, .. } => *epoch,
        }
    }
}

/// Spawn a connection attempt against `server_url`.
///
/// Returns the sender for outbound messages; dropping it closes the
/// socket gracefully.
pub(crate) fn spawn_socket(
    server_url: String,
    epoch: u64,
    connect_timeout: Duration,
    outbound_buffer: usize,
    events: mpsc::Sender<SocketEvent>,
) -> mpsc::Sender<ClientMessage> {
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_buffer);
    tokio::spawn(run_socket(
        server_url,
        epoch,
        connect_timeout,
        outbound_rx,
        events,
    ));
    outbound_tx
}

async fn run_socket(
    server_url: String,
    epoch: u64,
    connect_timeout: Duration,
    mut outbound: mpsc::Receiver<ClientMessage>,
    events: mpsc::Sender<SocketEvent>,
) {
    let ws = match tokio::time::timeout(connect_timeout, connect_async(server_url.as_str())).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            tracing::debug!(epoch, error = %e, "WebSocket connect failed");
            let _ = events
                .send(SocketEvent::Failed {
                    epoch,
                    error: e.to_string(),
                })
                .await;
            return;
        }
        Err(_) => {
            let _ = events
                .send(SocketEvent::Failed {
                    epoch,
                    error: format!("connect timed out after {connect_timeout:?}"),
                })
                .await;
            return;
        }
    };

    if events.send(SocketEvent::Opened { epoch }).await.is_err() {
        return;
    }

    let (mut sink, mut stream) = ws.split();

    // Writer half: forward queued messages until the worker drops its sender
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match message.to_json() {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode outbound message"),
            }
        }
        let _ = sink.close().await;
    });

    // Reader half: decode inbound frames until the stream ends
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                Ok(message) => {
                    if events
                        .send(SocketEvent::Message { epoch, message })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => tracing::debug!(epoch, error = %e, "Dropping undecodable message"),
            },
            Ok(Message::Binary(_)) => {
                tracing::debug!(epoch, "Binary messages not supported");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                tracing::trace!(epoch, "Heartbeat frame");
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|reason| !reason.is_empty());
                let _ = events.send(SocketEvent::Closed { epoch, reason }).await;
                return;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                let _ = events
                    .send(SocketEvent::Failed {
                        epoch,
                        error: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }

    let _ = events
        .send(SocketEvent::Closed {
            epoch,
            reason: None,
        })
        .await;
}
