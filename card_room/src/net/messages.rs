//! JSON wire messages exchanged with clients.

use serde::{Deserialize, Serialize};

use crate::game::view::EngineView;
use crate::lobby::LobbyView;

/// Server → client messages. Tagged with `type` so clients can dispatch
/// without schema knowledge.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The authoritative, viewer-filtered game state.
    GameState { data: Box<EngineView> },
    /// Pre-start lobby state.
    LobbyState {
        #[serde(flatten)]
        lobby: LobbyView,
    },
    /// Who is online in this room.
    ConnectionInfo {
        connected_players: Vec<String>,
        spectator_count: usize,
    },
    /// Heartbeat; clients answer with `pong`.
    Ping,
}

impl ServerMessage {
    /// Serialize for the wire. Infallible for these types.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("wire message serializes")
    }
}

/// Client → server messages arriving over the duplex channel. Game
/// actions travel over the HTTP surface; the channel only carries
/// connection upkeep.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_shape() {
        assert_eq!(ServerMessage::Ping.to_json(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_connection_info_shape() {
        let msg = ServerMessage::ConnectionInfo {
            connected_players: vec!["p1".to_string()],
            spectator_count: 2,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "connection_info");
        assert_eq!(value["connected_players"][0], "p1");
        assert_eq!(value["spectator_count"], 2);
    }

    #[test]
    fn test_pong_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Pong));
    }
}
