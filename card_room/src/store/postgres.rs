//! PostgreSQL-backed store.
//!
//! Rows are key-addressed JSONB documents, one table per record family:
//! `games` (lobby + activity timestamp), `engines`, and `game_events`
//! (the timestamped lifecycle log behind the admin metrics).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::timeouts::with_timeout;
use super::{GameStore, MetricKind, StoreError};
use crate::game::engine::GameEngine;
use crate::lobby::LobbyRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    code          TEXT PRIMARY KEY,
    data          JSONB NOT NULL,
    last_activity TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS engines (
    code TEXT PRIMARY KEY,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS game_events (
    id          BIGSERIAL PRIMARY KEY,
    kind        TEXT NOT NULL,
    code        TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS game_events_kind_recorded_at
    ON game_events (kind, recorded_at);
"#;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl GameStore for PostgresStore {
    async fn put_lobby(&self, lobby: &LobbyRecord) -> Result<(), StoreError> {
        let data = serde_json::to_value(lobby)?;
        with_timeout(async {
            sqlx::query(
                r#"
                INSERT INTO games (code, data, last_activity)
                VALUES ($1, $2, now())
                ON CONFLICT (code) DO UPDATE SET data = EXCLUDED.data
                "#,
            )
            .bind(&lobby.code)
            .bind(&data)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_lobby(&self, code: &str) -> Result<Option<LobbyRecord>, StoreError> {
        let row = with_timeout(async {
            Ok(sqlx::query("SELECT data FROM games WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;
        row.map(|r| {
            let data: serde_json::Value = r.get("data");
            serde_json::from_value(data).map_err(StoreError::from)
        })
        .transpose()
    }

    async fn put_engine(&self, code: &str, engine: &GameEngine) -> Result<(), StoreError> {
        let data = serde_json::to_value(engine)?;
        with_timeout(async {
            sqlx::query(
                r#"
                INSERT INTO engines (code, data)
                VALUES ($1, $2)
                ON CONFLICT (code) DO UPDATE SET data = EXCLUDED.data
                "#,
            )
            .bind(code)
            .bind(&data)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_engine(&self, code: &str) -> Result<Option<GameEngine>, StoreError> {
        let row = with_timeout(async {
            Ok(sqlx::query("SELECT data FROM engines WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;
        row.map(|r| {
            let data: serde_json::Value = r.get("data");
            serde_json::from_value(data).map_err(StoreError::from)
        })
        .transpose()
    }

    async fn delete_game(&self, code: &str) -> Result<(), StoreError> {
        with_timeout(async {
            sqlx::query("DELETE FROM engines WHERE code = $1")
                .bind(code)
                .execute(&self.pool)
                .await?;
            sqlx::query("DELETE FROM games WHERE code = $1")
                .bind(code)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn list_game_codes(&self) -> Result<Vec<String>, StoreError> {
        with_timeout(async {
            let rows = sqlx::query("SELECT code FROM games")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.iter().map(|r| r.get("code")).collect())
        })
        .await
    }

    async fn touch_activity(&self, code: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        with_timeout(async {
            sqlx::query("UPDATE games SET last_activity = $2 WHERE code = $1")
                .bind(code)
                .bind(at)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn last_activity(&self, code: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        with_timeout(async {
            let row = sqlx::query("SELECT last_activity FROM games WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(|r| r.get("last_activity")))
        })
        .await
    }

    async fn record_event(
        &self,
        kind: MetricKind,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        with_timeout(async {
            sqlx::query("INSERT INTO game_events (kind, code, recorded_at) VALUES ($1, $2, $3)")
                .bind(kind.as_str())
                .bind(code)
                .bind(at)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn count_events_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        with_timeout(async {
            let row = sqlx::query(
                "SELECT COUNT(*) AS n FROM game_events WHERE kind = $1 AND recorded_at >= $2",
            )
            .bind(kind.as_str())
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            let n: i64 = row.get("n");
            Ok(n as u64)
        })
        .await
    }

    async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        with_timeout(async {
            let result = sqlx::query("DELETE FROM game_events WHERE recorded_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}
