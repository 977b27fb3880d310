//! Per-game connection registry.
//!
//! Tracks every live client channel per room, fans game state out to
//! them, and keeps the sets honest with heartbeats. The registry never
//! holds its lock across a send: broadcasts iterate a snapshot so one
//! slow client cannot stall the rest.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use super::messages::ServerMessage;
use crate::game::engine::GameEngine;
use crate::lobby::LobbyView;

/// How long a single client send may take before the connection is
/// considered dead.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Consecutive failed sends before an entry is dropped.
const MAX_MISSED_SENDS: u32 = 2;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("send timed out")]
    Timeout,
}

/// Anything that can carry bytes to a client. The server's WebSocket
/// wrapper implements this; tests use in-memory channels.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), ChannelError>;
    async fn close(&self);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Player,
    Spectator,
}

#[derive(Clone)]
struct Entry {
    channel: Arc<dyn MessageChannel>,
    missed_sends: u32,
}

#[derive(Default)]
struct GameConnections {
    players: HashMap<String, Entry>,
    spectators: HashMap<String, Entry>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    games: Mutex<HashMap<String, GameConnections>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a channel for `id`. A newer connection supersedes any
    /// existing one for the same id, which is closed. Peers are told via
    /// `connection_info`.
    pub async fn register(
        &self,
        code: &str,
        id: &str,
        role: Role,
        channel: Arc<dyn MessageChannel>,
    ) {
        let superseded = {
            let mut games = self.games.lock().expect("registry mutex poisoned");
            let connections = games.entry(code.to_string()).or_default();
            let map = match role {
                Role::Player => &mut connections.players,
                Role::Spectator => &mut connections.spectators,
            };
            map.insert(
                id.to_string(),
                Entry {
                    channel,
                    missed_sends: 0,
                },
            )
        };
        if let Some(old) = superseded {
            tracing::debug!("game {code}: connection for {id} superseded");
            old.channel.close().await;
        }
        self.send_connection_info(code).await;
    }

    /// Detach a channel; emits `connection_info` when something was
    /// actually removed.
    pub async fn unregister(&self, code: &str, id: &str) {
        if self.remove_entry(code, id) {
            self.send_connection_info(code).await;
        }
    }

    /// Detach only if `channel` is still the registered one for `id`. A
    /// superseded connection tearing itself down must not evict its
    /// replacement.
    pub async fn unregister_if_current(
        &self,
        code: &str,
        id: &str,
        channel: &Arc<dyn MessageChannel>,
    ) {
        if self.remove_if_current(code, id, channel) {
            self.send_connection_info(code).await;
        }
    }

    fn remove_entry(&self, code: &str, id: &str) -> bool {
        let mut games = self.games.lock().expect("registry mutex poisoned");
        let Some(connections) = games.get_mut(code) else {
            return false;
        };
        let removed = connections
            .players
            .remove(id)
            .or_else(|| connections.spectators.remove(id))
            .is_some();
        if connections.players.is_empty() && connections.spectators.is_empty() {
            games.remove(code);
        }
        removed
    }

    fn remove_if_current(
        &self,
        code: &str,
        id: &str,
        channel: &Arc<dyn MessageChannel>,
    ) -> bool {
        let mut games = self.games.lock().expect("registry mutex poisoned");
        let Some(connections) = games.get_mut(code) else {
            return false;
        };
        let map = if connections.players.contains_key(id) {
            &mut connections.players
        } else {
            &mut connections.spectators
        };
        let current = map
            .get(id)
            .is_some_and(|e| Arc::ptr_eq(&e.channel, channel));
        let removed = current && map.remove(id).is_some();
        if connections.players.is_empty() && connections.spectators.is_empty() {
            games.remove(code);
        }
        removed
    }

    #[must_use]
    pub fn connected_player_ids(&self, code: &str) -> Vec<String> {
        let games = self.games.lock().expect("registry mutex poisoned");
        games.get(code).map_or_else(Vec::new, |c| {
            let mut ids: Vec<String> = c.players.keys().cloned().collect();
            ids.sort();
            ids
        })
    }

    #[must_use]
    pub fn spectator_count(&self, code: &str) -> usize {
        let games = self.games.lock().expect("registry mutex poisoned");
        games.get(code).map_or(0, |c| c.spectators.len())
    }

    /// Fan the engine state out: one filtered view per player, one
    /// card-free view shared by spectators.
    pub async fn broadcast_engine(&self, code: &str, engine: &GameEngine) {
        let (players, spectators) = self.snapshot(code);
        if players.is_empty() && spectators.is_empty() {
            return;
        }
        let now = Utc::now();

        let mut failed: Vec<(String, Arc<dyn MessageChannel>)> = Vec::new();
        for (id, channel) in &players {
            let view = engine.player_view(Some(id), now);
            let json = ServerMessage::GameState {
                data: Box::new(view),
            }
            .to_json();
            if !self.try_send(code, id, channel, json.as_bytes()).await {
                failed.push((id.clone(), channel.clone()));
            }
        }

        if !spectators.is_empty() {
            let view = engine.player_view(None, now);
            let json = ServerMessage::GameState {
                data: Box::new(view),
            }
            .to_json();
            for (id, channel) in &spectators {
                if !self.try_send(code, id, channel, json.as_bytes()).await {
                    failed.push((id.clone(), channel.clone()));
                }
            }
        }

        for (id, channel) in failed {
            self.unregister_if_current(code, &id, &channel).await;
        }
    }

    /// Send the lobby state to everyone in the room.
    pub async fn broadcast_lobby(&self, code: &str, lobby: &LobbyView) {
        let json = ServerMessage::LobbyState {
            lobby: lobby.clone(),
        }
        .to_json();
        self.broadcast_raw(code, json.as_bytes()).await;
    }

    /// Tell everyone who is online.
    pub async fn send_connection_info(&self, code: &str) {
        let json = ServerMessage::ConnectionInfo {
            connected_players: self.connected_player_ids(code),
            spectator_count: self.spectator_count(code),
        }
        .to_json();
        self.broadcast_raw(code, json.as_bytes()).await;
    }

    async fn broadcast_raw(&self, code: &str, bytes: &[u8]) {
        let (players, spectators) = self.snapshot(code);
        let mut removed_any = false;
        for (id, channel) in players.iter().chain(spectators.iter()) {
            if !self.try_send(code, id, channel, bytes).await {
                removed_any |= self.remove_if_current(code, id, channel);
            }
        }
        if removed_any {
            // Boxed: dropping an entry means re-announcing who is online,
            // which recurses through this function.
            Box::pin(self.send_connection_info(code)).await;
        }
    }

    /// One heartbeat pass over every room. Entries that miss two
    /// consecutive sends are unregistered.
    pub async fn heartbeat_pass(&self) {
        let codes: Vec<String> = {
            let games = self.games.lock().expect("registry mutex poisoned");
            games.keys().cloned().collect()
        };
        let ping = ServerMessage::Ping.to_json();

        for code in codes {
            let (players, spectators) = self.snapshot(&code);
            let mut dead: Vec<(String, Arc<dyn MessageChannel>)> = Vec::new();
            for (id, channel) in players.iter().chain(spectators.iter()) {
                let ok = send_with_timeout(channel, ping.as_bytes()).await;
                let missed = self.note_send_result(&code, id, ok);
                if missed >= MAX_MISSED_SENDS {
                    dead.push((id.clone(), channel.clone()));
                }
            }
            for (id, channel) in dead {
                tracing::debug!("game {code}: dropping {id} after missed heartbeats");
                self.unregister_if_current(&code, &id, &channel).await;
            }
        }
    }

    /// Run heartbeats until the task is cancelled.
    pub async fn run_heartbeat(self: Arc<Self>) {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.heartbeat_pass().await;
        }
    }

    fn snapshot(
        &self,
        code: &str,
    ) -> (
        Vec<(String, Arc<dyn MessageChannel>)>,
        Vec<(String, Arc<dyn MessageChannel>)>,
    ) {
        let games = self.games.lock().expect("registry mutex poisoned");
        let Some(connections) = games.get(code) else {
            return (Vec::new(), Vec::new());
        };
        let mut players: Vec<_> = connections
            .players
            .iter()
            .map(|(id, e)| (id.clone(), e.channel.clone()))
            .collect();
        players.sort_by(|a, b| a.0.cmp(&b.0));
        let spectators = connections
            .spectators
            .iter()
            .map(|(id, e)| (id.clone(), e.channel.clone()))
            .collect();
        (players, spectators)
    }

    async fn try_send(
        &self,
        code: &str,
        id: &str,
        channel: &Arc<dyn MessageChannel>,
        bytes: &[u8],
    ) -> bool {
        let ok = send_with_timeout(channel, bytes).await;
        if !ok {
            tracing::debug!("game {code}: send to {id} failed");
        }
        ok
    }

    /// Update an entry's missed-send counter; returns the new count.
    fn note_send_result(&self, code: &str, id: &str, ok: bool) -> u32 {
        let mut games = self.games.lock().expect("registry mutex poisoned");
        let Some(connections) = games.get_mut(code) else {
            return 0;
        };
        let entry = connections
            .players
            .get_mut(id)
            .or_else(|| connections.spectators.get_mut(id));
        let Some(entry) = entry else {
            return 0;
        };
        if ok {
            entry.missed_sends = 0;
        } else {
            entry.missed_sends += 1;
        }
        entry.missed_sends
    }
}

async fn send_with_timeout(channel: &Arc<dyn MessageChannel>, bytes: &[u8]) -> bool {
    matches!(
        tokio::time::timeout(SEND_TIMEOUT, channel.send_bytes(bytes)).await,
        Ok(Ok(()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    struct TestChannel {
        tx: mpsc::UnboundedSender<String>,
        closed: AtomicBool,
        fail: AtomicBool,
    }

    impl TestChannel {
        fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    tx,
                    closed: AtomicBool::new(false),
                    fail: AtomicBool::new(false),
                }),
                rx,
            )
        }
    }

    #[async_trait]
    impl MessageChannel for TestChannel {
        async fn send_bytes(&self, bytes: &[u8]) -> Result<(), ChannelError> {
            if self.fail.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            self.tx
                .send(String::from_utf8_lossy(bytes).into_owned())
                .map_err(|_| ChannelError::Closed)
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_reconnect_supersedes_old_channel() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = TestChannel::pair();
        let (second, _second_rx) = TestChannel::pair();

        registry
            .register("ROOM01", "p1", Role::Player, first.clone())
            .await;
        registry
            .register("ROOM01", "p1", Role::Player, second)
            .await;

        assert!(first.closed.load(Ordering::SeqCst));
        assert_eq!(registry.connected_player_ids("ROOM01"), vec!["p1"]);

        // The superseded channel saw at most the first connection_info.
        let mut p_seen = 0;
        while let Ok(msg) = first_rx.try_recv() {
            assert!(msg.contains("connection_info"));
            p_seen += 1;
        }
        assert!(p_seen <= 1);
    }

    #[tokio::test]
    async fn test_unregister_emits_connection_info() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = TestChannel::pair();
        let (b, mut b_rx) = TestChannel::pair();

        registry.register("ROOM01", "p1", Role::Player, a).await;
        registry.register("ROOM01", "p2", Role::Player, b).await;
        while b_rx.try_recv().is_ok() {}

        registry.unregister("ROOM01", "p1").await;

        let msg = b_rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["type"], "connection_info");
        assert_eq!(value["connected_players"], serde_json::json!(["p2"]));
    }

    #[tokio::test]
    async fn test_spectators_counted_not_listed() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = TestChannel::pair();
        let (s, _s_rx) = TestChannel::pair();

        registry.register("ROOM01", "p1", Role::Player, a).await;
        registry
            .register("ROOM01", "spec-1", Role::Spectator, s)
            .await;

        assert_eq!(registry.connected_player_ids("ROOM01"), vec!["p1"]);
        assert_eq!(registry.spectator_count("ROOM01"), 1);
    }

    #[tokio::test]
    async fn test_stale_handle_cannot_evict_replacement() {
        let registry = ConnectionRegistry::new();
        let (first, _first_rx) = TestChannel::pair();
        let (second, _second_rx) = TestChannel::pair();
        let first_dyn: Arc<dyn MessageChannel> = first.clone();

        registry.register("ROOM01", "p1", Role::Player, first).await;
        registry
            .register("ROOM01", "p1", Role::Player, second)
            .await;

        // The superseded connection's teardown is a no-op.
        registry
            .unregister_if_current("ROOM01", "p1", &first_dyn)
            .await;
        assert_eq!(registry.connected_player_ids("ROOM01"), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_heartbeat_drops_after_two_misses() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = TestChannel::pair();
        registry.register("ROOM01", "p1", Role::Player, a.clone()).await;

        a.fail.store(true, Ordering::SeqCst);
        registry.heartbeat_pass().await;
        assert_eq!(registry.connected_player_ids("ROOM01"), vec!["p1"]);

        registry.heartbeat_pass().await;
        assert!(registry.connected_player_ids("ROOM01").is_empty());
    }

    #[tokio::test]
    async fn test_failed_broadcast_unregisters() {
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = TestChannel::pair();
        let (b, mut b_rx) = TestChannel::pair();
        registry.register("ROOM01", "p1", Role::Player, a.clone()).await;
        registry.register("ROOM01", "p2", Role::Player, b).await;
        while b_rx.try_recv().is_ok() {}

        a.fail.store(true, Ordering::SeqCst);
        let lobby = crate::lobby::LobbyRecord::new(
            "ROOM01".to_string(),
            crate::game::entities::GameSettings::default(),
            "Alice",
            "1234",
            "127.0.0.1".to_string(),
            Utc::now(),
        )
        .view();
        registry.broadcast_lobby("ROOM01", &lobby).await;

        assert_eq!(registry.connected_player_ids("ROOM01"), vec!["p2"]);
        // p2 got the lobby state and then the connection_info for p1's drop.
        let first = b_rx.try_recv().unwrap();
        assert!(first.contains("lobby_state"));
    }
}
