//! In-memory store used by tests and single-node development.
//!
//! Records are held as JSON strings, not live objects, so every load goes
//! through the same serialize/rehydrate path as the real backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{GameStore, MetricKind, StoreError};
use crate::game::engine::GameEngine;
use crate::lobby::LobbyRecord;

#[derive(Default)]
struct Inner {
    lobbies: HashMap<String, String>,
    engines: HashMap<String, String>,
    activity: HashMap<String, DateTime<Utc>>,
    events: Vec<(MetricKind, String, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn put_lobby(&self, lobby: &LobbyRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(lobby)?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.lobbies.insert(lobby.code.clone(), json);
        Ok(())
    }

    async fn get_lobby(&self, code: &str) -> Result<Option<LobbyRecord>, StoreError> {
        let json = {
            let inner = self.inner.lock().expect("store mutex poisoned");
            inner.lobbies.get(code).cloned()
        };
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    async fn put_engine(&self, code: &str, engine: &GameEngine) -> Result<(), StoreError> {
        let json = serde_json::to_string(engine)?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.engines.insert(code.to_string(), json);
        Ok(())
    }

    async fn get_engine(&self, code: &str) -> Result<Option<GameEngine>, StoreError> {
        let json = {
            let inner = self.inner.lock().expect("store mutex poisoned");
            inner.engines.get(code).cloned()
        };
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    async fn delete_game(&self, code: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.lobbies.remove(code);
        inner.engines.remove(code);
        inner.activity.remove(code);
        Ok(())
    }

    async fn list_game_codes(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.lobbies.keys().cloned().collect())
    }

    async fn touch_activity(&self, code: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.activity.insert(code.to_string(), at);
        Ok(())
    }

    async fn last_activity(&self, code: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.activity.get(code).copied())
    }

    async fn record_event(
        &self,
        kind: MetricKind,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.events.push((kind, code.to_string(), at));
        Ok(())
    }

    async fn count_events_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .events
            .iter()
            .filter(|(k, _, at)| *k == kind && *at >= since)
            .count() as u64)
    }

    async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let before = inner.events.len();
        inner.events.retain(|(_, _, at)| *at >= cutoff);
        Ok((before - inner.events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::GameSettings;

    #[tokio::test]
    async fn test_lobby_round_trip() {
        let store = MemoryStore::new();
        let lobby = LobbyRecord::new(
            "ABCDEF".to_string(),
            GameSettings::default(),
            "Alice",
            "1234",
            "127.0.0.1".to_string(),
            Utc::now(),
        );
        store.put_lobby(&lobby).await.unwrap();

        let loaded = store.get_lobby("ABCDEF").await.unwrap().unwrap();
        assert_eq!(loaded, lobby);
        assert!(store.get_lobby("XXXXXX").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_game_removes_everything() {
        let store = MemoryStore::new();
        let lobby = LobbyRecord::new(
            "ABCDEF".to_string(),
            GameSettings::default(),
            "Alice",
            "1234",
            "127.0.0.1".to_string(),
            Utc::now(),
        );
        store.put_lobby(&lobby).await.unwrap();
        store.touch_activity("ABCDEF", Utc::now()).await.unwrap();

        store.delete_game("ABCDEF").await.unwrap();

        assert!(store.get_lobby("ABCDEF").await.unwrap().is_none());
        assert!(store.last_activity("ABCDEF").await.unwrap().is_none());
        assert!(store.list_game_codes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_counting_and_pruning() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = now - chrono::Duration::days(120);

        store
            .record_event(MetricKind::Created, "AAAAAA", old)
            .await
            .unwrap();
        store
            .record_event(MetricKind::Created, "BBBBBB", now)
            .await
            .unwrap();
        store
            .record_event(MetricKind::Cleaned, "AAAAAA", now)
            .await
            .unwrap();

        let since = now - chrono::Duration::days(1);
        assert_eq!(
            store
                .count_events_since(MetricKind::Created, since)
                .await
                .unwrap(),
            1
        );

        let pruned = store
            .prune_events(now - chrono::Duration::days(90))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
    }
}
