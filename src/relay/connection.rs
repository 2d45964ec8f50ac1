//! WebSocket connection pump
//!
//! Each socket is split in two. A writer task drains the connection's outbox
//! onto the sink, so a slow client only ever backs up its own queue. The
//! reader loop decodes frames in arrival order and hands them to the hub.
//! When the stream ends, for whatever reason (a panicking handler
//! included), the hub's disconnect cleanup runs exactly once.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use super::directory::Outbox;
use super::hub::Relay;
use super::protocol::{ClientMessage, ServerEvent, WireFrame};
use super::types::ConnectionId;

/// Serve one upgraded WebSocket until it closes
pub async fn serve_socket(socket: WebSocket, relay: Relay) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut rx) = Outbox::channel();
    let id = relay.connect(outbox);
    let _cleanup = DisconnectGuard::new(relay.clone(), id);

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(message) = to_message(id, &event) else {
                continue;
            };
            if let Err(e) = sink.send(message).await {
                tracing::debug!(connection_id = %id, error = %e, "Socket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => ClientMessage::from_text(&text),
            Ok(Message::Binary(bytes)) => ClientMessage::from_binary(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Socket read failed");
                break;
            }
        };

        match decoded {
            Ok(message) => relay.handle(id, message),
            Err(e) => relay.reject(id, &e),
        }
    }

    // Nothing queued for a closed socket is worth delivering
    writer.abort();
}

/// Runs the hub's disconnect when dropped, on return or unwind alike
pub(crate) struct DisconnectGuard {
    relay: Relay,
    id: ConnectionId,
}

impl DisconnectGuard {
    pub(crate) fn new(relay: Relay, id: ConnectionId) -> Self {
        Self { relay, id }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.relay.disconnect(self.id);
    }
}

fn to_message(id: ConnectionId, event: &ServerEvent) -> Option<Message> {
    match event.to_wire() {
        Ok(WireFrame::Text(text)) => Some(Message::Text(text)),
        Ok(WireFrame::Binary(bytes)) => Some(Message::Binary(bytes)),
        Err(e) => {
            tracing::warn!(connection_id = %id, event = event.name(), error = %e, "Failed to encode event");
            None
        }
    }
}
