//! Stale-game sweeper.
//!
//! Abandoned rooms rot in the store forever unless something removes
//! them. Every half hour this task walks the known codes and deletes
//! games idle past their threshold; finished games get a longer grace
//! period so players can come back for the result. Event-log entries
//! older than the retention window are pruned after each pass.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::coordinator::GameCoordinator;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Idle time before an unfinished game is deleted.
pub const STALE_AFTER_HOURS: i64 = 24;

/// Idle time before a finished game is deleted.
pub const COMPLETED_AFTER_HOURS: i64 = 72;

/// Event log retention.
pub const EVENT_RETENTION_DAYS: i64 = 90;

pub struct StaleGameSweeper {
    coordinator: Arc<GameCoordinator>,
}

impl StaleGameSweeper {
    #[must_use]
    pub fn new(coordinator: Arc<GameCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Sweep until the task is cancelled at shutdown.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            "sweeper started (interval {}s)",
            SWEEP_INTERVAL.as_secs()
        );
        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// One full pass. Returns the codes that were deleted.
    pub async fn sweep(&self) -> Vec<String> {
        let now = Utc::now();
        let codes = match self.coordinator.list_game_codes().await {
            Ok(codes) => codes,
            Err(e) => {
                tracing::warn!("sweep could not list games: {e}");
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for code in codes {
            match self
                .coordinator
                .delete_if_stale(
                    &code,
                    now,
                    ChronoDuration::hours(STALE_AFTER_HOURS),
                    ChronoDuration::hours(COMPLETED_AFTER_HOURS),
                )
                .await
            {
                Ok(true) => deleted.push(code),
                Ok(false) => {}
                Err(e) => tracing::warn!("game {code}: sweep failed: {e}"),
            }
        }

        match self
            .coordinator
            .prune_events(now - ChronoDuration::days(EVENT_RETENTION_DAYS))
            .await
        {
            Ok(0) => {}
            Ok(n) => tracing::debug!("pruned {n} old event(s)"),
            Err(e) => tracing::warn!("event pruning failed: {e}"),
        }

        if !deleted.is_empty() {
            tracing::info!("sweep deleted {} game(s): {}", deleted.len(), deleted.join(", "));
        }
        deleted
    }
}
