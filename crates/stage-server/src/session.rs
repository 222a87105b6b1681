//! Per-connection websocket lifecycle.
//!
//! Each viewer gets an unbounded outbound queue and a writer task that
//! drains it into the socket sink. The read loop only ever touches the
//! queue, so broadcasts from other connections never block on a slow
//! peer's socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use stage_scene::ClientMessage;

use crate::hub::Hub;

/// Drives one websocket connection until the peer disconnects.
pub async fn run(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();

    let connection = hub.connect(sender.clone());
    debug!(connection, "viewer connected");

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            inbound = stream.next() => {
                let Some(Ok(message)) = inbound else { break };
                match message {
                    Message::Text(text) => handle_text(&hub, text.as_str()),
                    Message::Ping(payload) => {
                        if sender.send(Message::Pong(payload)).is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    Message::Pong(_) | Message::Binary(_) => {}
                }
            }
        }
    }

    hub.disconnect(connection);
    writer.abort();
    debug!(connection, "viewer disconnected");
}

fn handle_text(hub: &Arc<Hub>, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(error) => {
            debug!(%error, "ignoring undecodable frame");
            return;
        }
    };
    match message {
        ClientMessage::Hello => {}
        ClientMessage::Command { text } => hub.clone().handle_command(&text),
        ClientMessage::Patch { patch } => hub.clone().handle_patch(patch),
        ClientMessage::Unknown => debug!("ignoring unrecognized message type"),
    }
}
