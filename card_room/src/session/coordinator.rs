//! The session coordinator: the only writer of game state.
//!
//! Every mutation follows the same protocol: acquire the game's mutex,
//! load and rehydrate the engine, apply the operation, verify invariants,
//! persist, release, then fan the new state out. The fan-out happens on a
//! detached task so a slow client never blocks the next operation. Locks
//! are `tokio::sync::Mutex`es, which hand out permits in FIFO order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::ServiceError;
use crate::game::engine::GameEngine;
use crate::game::entities::{Action, PlayerSeat};
use crate::game::view::EngineView;
use crate::lobby::{
    self, GameStatus, LobbyRecord, LobbyView, NewGameRequest,
};
use crate::net::ConnectionRegistry;
use crate::store::{GameStore, MetricKind, StoreError};

/// Who a mutation claims to be, checked against the stored PIN digest.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub player_id: &'a str,
    pub pin: &'a str,
}

pub struct GameCoordinator {
    store: Arc<dyn GameStore>,
    registry: Arc<ConnectionRegistry>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    action_deadlines: Mutex<HashMap<String, DateTime<Utc>>>,
    auto_deal_deadlines: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl GameCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn GameStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            store,
            registry,
            locks: Mutex::new(HashMap::new()),
            action_deadlines: Mutex::new(HashMap::new()),
            auto_deal_deadlines: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    fn game_lock(&self, code: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(code.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn forget_game(&self, code: &str) {
        self.locks.lock().expect("lock map poisoned").remove(code);
        self.action_deadlines
            .lock()
            .expect("deadline map poisoned")
            .remove(code);
        self.auto_deal_deadlines
            .lock()
            .expect("deadline map poisoned")
            .remove(code);
    }

    // ------------------------------------------------------------------
    // Store access with one retry on timeout
    // ------------------------------------------------------------------

    async fn load_lobby(&self, code: &str) -> Result<LobbyRecord, ServiceError> {
        let first = self.store.get_lobby(code).await;
        let result = match first {
            Err(StoreError::Timeout(_)) => {
                self.store.get_lobby(code).await.map_err(|e| match e {
                    StoreError::Timeout(_) => ServiceError::Transient,
                    other => ServiceError::from(other),
                })?
            }
            other => other.map_err(ServiceError::from)?,
        };
        result.ok_or(ServiceError::NotFound)
    }

    async fn load_engine(&self, code: &str) -> Result<GameEngine, ServiceError> {
        let first = self.store.get_engine(code).await;
        let result = match first {
            Err(StoreError::Timeout(_)) => {
                self.store.get_engine(code).await.map_err(|e| match e {
                    StoreError::Timeout(_) => ServiceError::Transient,
                    other => ServiceError::from(other),
                })?
            }
            other => other.map_err(ServiceError::from)?,
        };
        result.ok_or(ServiceError::NotFound)
    }

    async fn save_lobby(&self, lobby: &LobbyRecord) -> Result<(), ServiceError> {
        match self.store.put_lobby(lobby).await {
            Err(StoreError::Timeout(_)) => {
                self.store.put_lobby(lobby).await.map_err(|e| match e {
                    StoreError::Timeout(_) => ServiceError::Transient,
                    other => ServiceError::from(other),
                })
            }
            other => other.map_err(ServiceError::from),
        }
    }

    async fn save_engine(&self, code: &str, engine: &GameEngine) -> Result<(), ServiceError> {
        match self.store.put_engine(code, engine).await {
            Err(StoreError::Timeout(_)) => {
                self.store
                    .put_engine(code, engine)
                    .await
                    .map_err(|e| match e {
                        StoreError::Timeout(_) => ServiceError::Transient,
                        other => ServiceError::from(other),
                    })
            }
            other => other.map_err(ServiceError::from),
        }
    }

    // ------------------------------------------------------------------
    // Lobby operations
    // ------------------------------------------------------------------

    /// Create a game and seat its creator.
    pub async fn create_game(
        &self,
        request: NewGameRequest,
        creator_ip: String,
    ) -> Result<(String, String, LobbyView), ServiceError> {
        lobby::validate_settings(&request.settings)
            .map_err(ServiceError::InvalidArgument)?;
        if !lobby::is_valid_name(&request.creator_name) {
            return Err(ServiceError::InvalidArgument("invalid name".to_string()));
        }
        if !lobby::is_valid_pin(&request.creator_pin) {
            return Err(ServiceError::InvalidArgument(
                "PIN must be 4 digits".to_string(),
            ));
        }

        let now = Utc::now();
        // Regenerate on the (rare) collision.
        let mut code = lobby::generate_code();
        while self
            .store
            .get_lobby(&code)
            .await
            .map_err(ServiceError::from)?
            .is_some()
        {
            code = lobby::generate_code();
        }

        let record = LobbyRecord::new(
            code.clone(),
            request.settings,
            request.creator_name.trim(),
            &request.creator_pin,
            creator_ip,
            now,
        );
        self.save_lobby(&record).await?;
        let _ = self.store.touch_activity(&code, now).await;
        if let Err(e) = self.store.record_event(MetricKind::Created, &code, now).await {
            tracing::warn!("game {code}: failed to record creation event: {e}");
        }
        metrics::counter!("games_created_total").increment(1);
        tracing::info!("game {code}: created by {}", record.creator_id);

        Ok((code, record.creator_id.clone(), record.view()))
    }

    /// Join a lobby, or reconnect when the name and PIN match an existing
    /// seat.
    pub async fn join_game(
        &self,
        code: &str,
        name: &str,
        pin: &str,
    ) -> Result<(String, LobbyView), ServiceError> {
        if !lobby::is_valid_name(name) {
            return Err(ServiceError::InvalidArgument("invalid name".to_string()));
        }
        if !lobby::is_valid_pin(pin) {
            return Err(ServiceError::InvalidArgument(
                "PIN must be 4 digits".to_string(),
            ));
        }

        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let now = Utc::now();
        let mut record = self.load_lobby(code).await?;

        if let Some(existing) = record.find_by_name(name) {
            // Same name and PIN is a reconnect, valid at any game stage.
            if lobby::verify_pin(pin, &existing.pin_hash) {
                return Ok((existing.id.clone(), record.view()));
            }
            return Err(ServiceError::Unauthorized);
        }

        if record.status != GameStatus::Lobby {
            return Err(ServiceError::InvalidState(
                "game already started".to_string(),
            ));
        }
        if record.players.len() >= record.settings.max_players {
            return Err(ServiceError::Conflict);
        }

        let player = crate::lobby::LobbyPlayer {
            id: lobby::new_player_id(),
            name: name.trim().to_string(),
            pin_hash: lobby::hash_pin(pin),
            ready: false,
            connected: false,
            is_creator: false,
        };
        let player_id = player.id.clone();
        record.players.push(player);
        record.last_activity = now;
        self.save_lobby(&record).await?;
        let _ = self.store.touch_activity(code, now).await;
        drop(_guard);

        let view = record.view();
        self.spawn_lobby_broadcast(code, view.clone());
        Ok((player_id, view))
    }

    /// Flip a player's ready flag. Lobby only.
    pub async fn toggle_ready(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<LobbyView, ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let mut record = self.load_lobby(code).await?;
        if record.status != GameStatus::Lobby {
            return Err(ServiceError::InvalidState(
                "game already started".to_string(),
            ));
        }
        verify_lobby_credentials(&record, credentials)?;

        let player = record
            .find_player_mut(credentials.player_id)
            .ok_or(ServiceError::NotFound)?;
        player.ready = !player.ready;
        record.last_activity = Utc::now();
        self.save_lobby(&record).await?;
        drop(_guard);

        let view = record.view();
        self.spawn_lobby_broadcast(code, view.clone());
        Ok(view)
    }

    /// Leave the lobby. The creator seat passes to the earliest remaining
    /// joiner; an emptied lobby is deleted.
    pub async fn leave_game(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<Option<LobbyView>, ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let mut record = self.load_lobby(code).await?;
        if record.status != GameStatus::Lobby {
            return Err(ServiceError::InvalidState(
                "can only leave before the game starts".to_string(),
            ));
        }
        verify_lobby_credentials(&record, credentials)?;

        record.players.retain(|p| p.id != credentials.player_id);
        if record.players.is_empty() {
            self.store
                .delete_game(code)
                .await
                .map_err(ServiceError::from)?;
            drop(_guard);
            self.forget_game(code);
            return Ok(None);
        }

        if record.creator_id == credentials.player_id {
            record.creator_id = record.players[0].id.clone();
            for (i, p) in record.players.iter_mut().enumerate() {
                p.is_creator = i == 0;
            }
        }
        record.last_activity = Utc::now();
        self.save_lobby(&record).await?;
        drop(_guard);

        let view = record.view();
        self.spawn_lobby_broadcast(code, view.clone());
        Ok(Some(view))
    }

    /// Start the game: freeze settings, seat everyone in join order, deal
    /// hand one. Creator only; requires 2+ players, all ready.
    pub async fn start_game(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let now = Utc::now();
        let mut record = self.load_lobby(code).await?;
        if record.status != GameStatus::Lobby {
            return Err(ServiceError::InvalidState(
                "game already started".to_string(),
            ));
        }
        verify_lobby_credentials(&record, credentials)?;
        if record.creator_id != credentials.player_id {
            return Err(ServiceError::Unauthorized);
        }
        if record.players.len() < 2 {
            return Err(ServiceError::InvalidState(
                "need at least 2 players".to_string(),
            ));
        }
        let not_ready: Vec<&str> = record
            .players
            .iter()
            .filter(|p| !p.ready)
            .map(|p| p.name.as_str())
            .collect();
        if !not_ready.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "players not ready: {}",
                not_ready.join(", ")
            )));
        }

        let seats: Vec<PlayerSeat> = record
            .players
            .iter()
            .map(|p| {
                PlayerSeat::new(
                    p.id.clone(),
                    p.name.clone(),
                    p.pin_hash.clone(),
                    p.is_creator,
                    record.settings.starting_chips,
                )
            })
            .collect();
        let mut engine = GameEngine::new(code, record.settings.clone(), seats, now);
        engine.start_hand(now).map_err(ServiceError::from)?;
        engine.check_invariants().map_err(ServiceError::from)?;

        self.save_engine(code, &engine).await?;
        record.status = GameStatus::Active;
        record.last_activity = now;
        self.save_lobby(&record).await?;
        let _ = self.store.touch_activity(code, now).await;
        self.update_deadlines(code, &engine);
        drop(_guard);

        tracing::info!("game {code}: started with {} players", engine.seats.len());
        self.spawn_lobby_broadcast(code, record.view());
        self.spawn_engine_broadcast(code, engine);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn lobby_view(&self, code: &str) -> Result<LobbyView, ServiceError> {
        Ok(self.load_lobby(code).await?.view())
    }

    /// The engine state as one viewer sees it. `None` is a spectator.
    pub async fn engine_view(
        &self,
        code: &str,
        viewer: Option<&str>,
    ) -> Result<EngineView, ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let engine = self.load_engine(code).await?;
        if let Some(id) = viewer {
            if engine.find_seat(id).is_none() {
                return Err(ServiceError::NotFound);
            }
        }
        Ok(engine.player_view(viewer, Utc::now()))
    }

    /// Mark a player's lobby connection flag and tell the room.
    pub async fn set_player_connected(
        &self,
        code: &str,
        player_id: &str,
        connected: bool,
    ) -> Result<(), ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let mut record = self.load_lobby(code).await?;
        let Some(player) = record.find_player_mut(player_id) else {
            return Err(ServiceError::NotFound);
        };
        player.connected = connected;
        self.save_lobby(&record).await?;
        drop(_guard);
        self.spawn_lobby_broadcast(code, record.view());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Engine mutations
    // ------------------------------------------------------------------

    pub async fn process_action(
        &self,
        code: &str,
        credentials: Credentials<'_>,
        action: Action,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), false, |engine, now| {
            engine.process_action(credentials.player_id, action, now)
        })
        .await
    }

    /// Deal the next hand. Creator only.
    pub async fn deal_hand(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), true, |engine, now| {
            engine.start_hand(now)
        })
        .await
    }

    pub async fn request_rebuy(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), false, |engine, now| {
            engine.request_rebuy(credentials.player_id, now)
        })
        .await
    }

    pub async fn cancel_rebuy(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), false, |engine, _| {
            engine.cancel_rebuy(credentials.player_id)
        })
        .await
    }

    pub async fn show_cards(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), false, |engine, _| {
            engine.show_cards(credentials.player_id)
        })
        .await
    }

    /// Pause the game clock. Creator only, between hands.
    pub async fn pause_game(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), true, |engine, now| engine.pause(now))
            .await
    }

    pub async fn resume_game(
        &self,
        code: &str,
        credentials: Credentials<'_>,
    ) -> Result<(), ServiceError> {
        self.mutate_engine(code, Some(credentials), true, |engine, now| {
            engine.resume(now)
        })
        .await
    }

    /// The load-modify-save protocol shared by every engine mutation.
    async fn mutate_engine<F>(
        &self,
        code: &str,
        credentials: Option<Credentials<'_>>,
        creator_only: bool,
        op: F,
    ) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut GameEngine, DateTime<Utc>) -> Result<(), crate::game::EngineError>,
    {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let now = Utc::now();
        let mut engine = self.load_engine(code).await?;

        if let Some(credentials) = credentials {
            let idx = engine
                .find_seat(credentials.player_id)
                .ok_or(ServiceError::NotFound)?;
            let seat = &engine.seats[idx];
            if !lobby::verify_pin(credentials.pin, &seat.pin_hash) {
                return Err(ServiceError::Unauthorized);
            }
            if creator_only && !seat.is_creator {
                return Err(ServiceError::Unauthorized);
            }
        }

        let was_over = engine.game_over;
        op(&mut engine, now)?;
        self.commit(code, engine, was_over, now).await?;
        Ok(())
    }

    /// Invariant check, game-over edge handling, persist, deadline
    /// registration, and fan-out hand-off. Caller holds the game lock.
    async fn commit(
        &self,
        code: &str,
        engine: GameEngine,
        was_over: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Err(violation) = engine.check_invariants() {
            tracing::warn!("game {code}: {violation}; discarding state");
            return Err(ServiceError::Internal);
        }

        if engine.game_over && !was_over {
            match self.store.get_lobby(code).await {
                Ok(Some(mut record)) => {
                    record.status = GameStatus::Ended;
                    record.last_activity = now;
                    self.save_lobby(&record).await?;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("game {code}: could not mark lobby ended: {e}"),
            }
            if let Err(e) = self
                .store
                .record_event(MetricKind::Completed, code, now)
                .await
            {
                tracing::warn!("game {code}: failed to record completion event: {e}");
            }
            metrics::counter!("games_completed_total").increment(1);
            tracing::info!("game {code}: finished after {} hands", engine.hand_number);
        }

        self.save_engine(code, &engine).await?;
        let _ = self.store.touch_activity(code, now).await;
        self.update_deadlines(code, &engine);
        self.spawn_engine_broadcast(code, engine);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timer integration
    // ------------------------------------------------------------------

    fn update_deadlines(&self, code: &str, engine: &GameEngine) {
        {
            let mut map = self.action_deadlines.lock().expect("deadline map poisoned");
            match engine.action_deadline {
                Some(deadline) if !engine.paused => {
                    map.insert(code.to_string(), deadline);
                }
                _ => {
                    map.remove(code);
                }
            }
        }
        {
            let mut map = self
                .auto_deal_deadlines
                .lock()
                .expect("deadline map poisoned");
            match engine.auto_deal_deadline {
                Some(deadline) if !engine.paused && !engine.game_over => {
                    map.insert(code.to_string(), deadline);
                }
                _ => {
                    map.remove(code);
                }
            }
        }
    }

    /// Pop every expired action deadline. Handlers re-register deadlines
    /// that turn out to have moved.
    #[must_use]
    pub fn expired_action_deadlines(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut map = self.action_deadlines.lock().expect("deadline map poisoned");
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            map.remove(code);
        }
        expired
    }

    #[must_use]
    pub fn expired_auto_deals(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut map = self
            .auto_deal_deadlines
            .lock()
            .expect("deadline map poisoned");
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            map.remove(code);
        }
        expired
    }

    /// Auto-act for a player whose turn clock ran out: check when legal,
    /// fold otherwise.
    pub async fn handle_action_timeout(&self, code: &str) -> Result<(), ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let now = Utc::now();
        let Ok(mut engine) = self.load_engine(code).await else {
            return Ok(());
        };
        if !engine.hand_active || engine.paused {
            return Ok(());
        }
        let Some(deadline) = engine.action_deadline else {
            return Ok(());
        };
        if now < deadline {
            // Someone acted in the meantime; track the new deadline.
            self.update_deadlines(code, &engine);
            return Ok(());
        }
        let Some(idx) = engine.action_on_idx else {
            return Ok(());
        };

        let player_id = engine.seats[idx].player_id.clone();
        let to_call = engine
            .current_bet
            .saturating_sub(engine.seats[idx].bet_this_round);
        let action = if to_call == 0 {
            Action::Check
        } else {
            Action::Fold
        };
        tracing::info!(
            "game {code}: {} timed out, auto {}",
            engine.seats[idx].name,
            if to_call == 0 { "check" } else { "fold" }
        );

        let was_over = engine.game_over;
        engine
            .process_action(&player_id, action, now)
            .map_err(ServiceError::from)?;
        metrics::counter!("turn_timeouts_total").increment(1);
        self.commit(code, engine, was_over, now).await
    }

    /// Deal the next hand once the between-hands pause has elapsed.
    pub async fn handle_auto_deal(&self, code: &str) -> Result<(), ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;
        let now = Utc::now();
        let Ok(mut engine) = self.load_engine(code).await else {
            return Ok(());
        };
        if engine.hand_active || engine.paused || engine.game_over {
            return Ok(());
        }
        let Some(deadline) = engine.auto_deal_deadline else {
            return Ok(());
        };
        if now < deadline {
            self.update_deadlines(code, &engine);
            return Ok(());
        }

        let was_over = engine.game_over;
        match engine.start_hand(now) {
            Ok(()) => {
                tracing::debug!("game {code}: auto-dealt hand {}", engine.hand_number);
                self.commit(code, engine, was_over, now).await
            }
            Err(e) => {
                // Not enough seats; stay disarmed until something changes.
                tracing::debug!("game {code}: auto-deal skipped: {e}");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Sweeping
    // ------------------------------------------------------------------

    /// Delete the game if it has been inactive past its threshold: 24 h
    /// for unfinished games, 72 h for finished ones. Returns whether the
    /// game was removed.
    pub async fn delete_if_stale(
        &self,
        code: &str,
        now: DateTime<Utc>,
        stale_after: chrono::Duration,
        completed_after: chrono::Duration,
    ) -> Result<bool, ServiceError> {
        let lock = self.game_lock(code);
        let _guard = lock.lock().await;

        let last_activity = match self.store.last_activity(code).await {
            Ok(Some(at)) => at,
            Ok(None) => {
                // No timestamp at all: grant a full window from now.
                let _ = self.store.touch_activity(code, now).await;
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!("game {code}: sweep could not read activity: {e}");
                return Ok(false);
            }
        };

        let ended = match self.store.get_engine(code).await {
            Ok(Some(engine)) => engine.game_over,
            _ => match self.store.get_lobby(code).await {
                Ok(Some(record)) => record.status == GameStatus::Ended,
                _ => false,
            },
        };

        let threshold = if ended { completed_after } else { stale_after };
        if now - last_activity < threshold {
            return Ok(false);
        }

        if let Err(e) = self.store.record_event(MetricKind::Cleaned, code, now).await {
            tracing::warn!("game {code}: failed to record cleanup event: {e}");
        }
        self.store
            .delete_game(code)
            .await
            .map_err(ServiceError::from)?;
        metrics::counter!("games_cleaned_total").increment(1);
        tracing::info!(
            "game {code}: swept after {:.1}h idle (ended={ended})",
            (now - last_activity).num_minutes() as f64 / 60.0
        );
        drop(_guard);
        self.forget_game(code);
        Ok(true)
    }

    pub async fn list_game_codes(&self) -> Result<Vec<String>, ServiceError> {
        self.store
            .list_game_codes()
            .await
            .map_err(ServiceError::from)
    }

    pub async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<u64, ServiceError> {
        self.store.prune_events(cutoff).await.map_err(ServiceError::from)
    }

    // ------------------------------------------------------------------
    // Broadcasts
    // ------------------------------------------------------------------

    fn spawn_engine_broadcast(&self, code: &str, engine: GameEngine) {
        let registry = self.registry.clone();
        let code = code.to_string();
        tokio::spawn(async move {
            registry.broadcast_engine(&code, &engine).await;
        });
    }

    fn spawn_lobby_broadcast(&self, code: &str, view: LobbyView) {
        let registry = self.registry.clone();
        let code = code.to_string();
        tokio::spawn(async move {
            registry.broadcast_lobby(&code, &view).await;
        });
    }
}

fn verify_lobby_credentials(
    record: &LobbyRecord,
    credentials: Credentials<'_>,
) -> Result<(), ServiceError> {
    let player = record
        .find_player(credentials.player_id)
        .ok_or(ServiceError::NotFound)?;
    if !lobby::verify_pin(credentials.pin, &player.pin_hash) {
        return Err(ServiceError::Unauthorized);
    }
    Ok(())
}
