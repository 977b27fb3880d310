//! Background timer driver.
//!
//! A single task wakes once a second and fires expired deadlines: turn
//! clocks become an auto check-or-fold, and elapsed between-hand pauses
//! become an auto-deal. All real work goes back through the coordinator,
//! which re-validates every deadline under the game's mutex because a
//! player action may have raced the tick.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::coordinator::GameCoordinator;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct TimerDriver {
    coordinator: Arc<GameCoordinator>,
}

impl TimerDriver {
    #[must_use]
    pub fn new(coordinator: Arc<GameCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Tick until the task is cancelled at shutdown.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("timer driver started");
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One pass over every armed deadline.
    pub async fn tick(&self) {
        let now = Utc::now();

        for code in self.coordinator.expired_action_deadlines(now) {
            if let Err(e) = self.coordinator.handle_action_timeout(&code).await {
                tracing::warn!("game {code}: action timeout handling failed: {e}");
            }
        }

        for code in self.coordinator.expired_auto_deals(now) {
            if let Err(e) = self.coordinator.handle_auto_deal(&code).await {
                tracing::warn!("game {code}: auto-deal failed: {e}");
            }
        }
    }
}
