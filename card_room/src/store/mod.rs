//! Persistence layer.
//!
//! Game state lives in an external store addressed by room code:
//! the lobby record, the engine record, an activity timestamp, and a
//! timestamped event log backing the admin metrics. The coordinator only
//! ever touches a game's rows while holding that game's mutex.

pub mod memory;
pub mod postgres;
pub mod timeouts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::game::engine::GameEngine;
use crate::lobby::LobbyRecord;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend did not answer within the operation timeout. The
    /// coordinator retries these once before surfacing `Transient`.
    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Lifecycle events recorded for the admin dashboard, pruned to the last
/// 90 days.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricKind {
    Created,
    Completed,
    Cleaned,
}

impl MetricKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Completed => "completed",
            Self::Cleaned => "cleaned",
        }
    }
}

/// Key-value style game persistence.
///
/// Implementations serialize records as JSON so that every load exercises
/// the same rehydration path; an engine that fails to round-trip is a bug
/// the store must surface, never paper over.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn put_lobby(&self, lobby: &LobbyRecord) -> Result<(), StoreError>;
    async fn get_lobby(&self, code: &str) -> Result<Option<LobbyRecord>, StoreError>;

    async fn put_engine(&self, code: &str, engine: &GameEngine) -> Result<(), StoreError>;
    async fn get_engine(&self, code: &str) -> Result<Option<GameEngine>, StoreError>;

    /// Remove every row belonging to a game.
    async fn delete_game(&self, code: &str) -> Result<(), StoreError>;

    async fn list_game_codes(&self) -> Result<Vec<String>, StoreError>;

    async fn touch_activity(&self, code: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn last_activity(&self, code: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_event(
        &self,
        kind: MetricKind,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn count_events_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
    /// Delete events recorded before `cutoff`; returns how many were
    /// removed.
    async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
