//! WebSocket endpoint: the duplex channel clients hold for the life of a
//! session.
//!
//! Connection flow:
//!
//! 1. Client connects to `GET /ws/{code}/{participant_id}`. A known
//!    player id joins as a player; anything else becomes a spectator.
//! 2. The socket's send half is wrapped as a [`MessageChannel`] and
//!    registered, superseding any previous connection for the same id.
//! 3. The current lobby state (and engine state, if the game is running)
//!    is pushed immediately so reconnects render without waiting for the
//!    next broadcast.
//! 4. The receive loop only consumes `pong`s; gameplay actions go over
//!    the HTTP API.
//! 5. On disconnect the channel is unregistered, unless a newer
//!    connection already took its place.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

use card_room::lobby::GameStatus;
use card_room::net::messages::{ClientMessage, ServerMessage};
use card_room::net::{ChannelError, MessageChannel, Role};

use super::AppState;

/// The send half of a WebSocket as a registry channel.
struct WsChannel {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl MessageChannel for WsChannel {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path((code, participant_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let code = code.to_uppercase();
    ws.on_upgrade(move |socket| handle_socket(socket, code, participant_id, state))
}

async fn handle_socket(socket: WebSocket, code: String, participant_id: String, state: AppState) {
    // Unknown ids (and unknown games, pending the lookup below) spectate.
    let lobby = state.coordinator.lobby_view(&code).await.ok();
    let Some(lobby) = lobby else {
        // No such game; drop the socket without registering.
        let mut socket = socket;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    let is_player = lobby.players.iter().any(|p| p.id == participant_id);
    let role = if is_player {
        Role::Player
    } else {
        Role::Spectator
    };

    let (sink, stream) = socket.split();
    let channel: Arc<dyn MessageChannel> = Arc::new(WsChannel {
        sink: Mutex::new(sink),
    });

    tracing::info!("ws connected: game={code} id={participant_id} role={role:?}");
    state
        .registry
        .register(&code, &participant_id, role, channel.clone())
        .await;
    if is_player {
        let _ = state
            .coordinator
            .set_player_connected(&code, &participant_id, true)
            .await;
    }

    // Push current state immediately so reconnects catch up.
    let _ = channel
        .send_bytes(
            ServerMessage::LobbyState {
                lobby: lobby.clone(),
            }
            .to_json()
            .as_bytes(),
        )
        .await;
    if lobby.status != GameStatus::Lobby {
        let viewer = is_player.then_some(participant_id.as_str());
        if let Ok(view) = state.coordinator.engine_view(&code, viewer).await {
            let _ = channel
                .send_bytes(
                    ServerMessage::GameState {
                        data: Box::new(view),
                    }
                    .to_json()
                    .as_bytes(),
                )
                .await;
        }
    }

    read_until_closed(stream).await;

    // A newer connection for the same id must survive this teardown.
    state
        .registry
        .unregister_if_current(&code, &participant_id, &channel)
        .await;
    if is_player {
        let _ = state
            .coordinator
            .set_player_connected(&code, &participant_id, false)
            .await;
    }
    tracing::info!("ws disconnected: game={code} id={participant_id}");
}

/// Drain incoming frames until the client goes away. Only `pong` is
/// meaningful; everything else is ignored.
async fn read_until_closed(mut stream: SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Pong) => {}
                    Err(_) => {
                        tracing::debug!("ignoring unrecognized ws message");
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}
