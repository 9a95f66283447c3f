use crate::relay::Relay;
use crate::subscription::protocol::{ClientEvent, ServerEvent};
use crate::subscription::registry::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives a single WebSocket connection.
///
/// Inbound frames are dispatched to the relay; everything outbound (welcome,
/// replies, broadcasts) goes through the connection's registry queue so it
/// reaches the socket in the order it was produced.
pub struct ConnectionManager {
    relay: Arc<Relay>,
}

impl ConnectionManager {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(self, mut socket: WebSocket) {
        let registry = Arc::clone(self.relay.registry());
        let (state, mut outbound) = registry.register();
        let id = state.id;

        info!(connection_id = %id, clients = registry.len(), "Client connected");

        if let Err(e) = registry.send_to(id, &ServerEvent::welcome()) {
            warn!(connection_id = %id, error = %e, "Failed to queue welcome");
        }

        let reason = loop {
            tokio::select! {
                // Handle incoming client messages
                incoming = socket.recv() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_client_message(id, &text).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            break "client closed".to_string();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                break format!("failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            break format!("transport error: {}", e);
                        }
                        None => {
                            break "stream ended".to_string();
                        }
                    }
                }

                // Flush queued replies and broadcasts
                frame = outbound.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = socket.send(Message::Text(frame.to_string())).await {
                                break format!("send failed: {}", e);
                            }
                        }
                        None => {
                            break "outbound queue closed".to_string();
                        }
                    }
                }
            }
        };

        registry.deregister(id, &reason);
    }

    /// Dispatch one client frame and queue the reply for this connection
    async fn handle_client_message(&self, id: ConnectionId, text: &str) {
        let event = match ClientEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Ignoring client frame");
                return;
            }
        };

        debug!(connection_id = %id, event = event.name(), "Client event");

        let reply = self.relay.handle_event(id, event).await;
        if let Err(e) = self.relay.registry().send_to(id, &reply) {
            warn!(connection_id = %id, error = %e, "Failed to queue reply");
        }
    }
}
