//! Lobby model: the pre-start game record, room codes, and PIN auth.
//!
//! A lobby record lives in the store under its room code for the whole
//! life of the game; once started it mostly tracks status and connection
//! flags while the engine record carries the table.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::game::constants::{CODE_ALPHABET, CODE_LENGTH, MAX_PLAYERS};
use crate::game::entities::GameSettings;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Lobby,
    Active,
    Ended,
}

/// A seat reservation, stored with its PIN digest.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LobbyPlayer {
    pub id: String,
    pub name: String,
    pub pin_hash: String,
    pub ready: bool,
    pub connected: bool,
    pub is_creator: bool,
}

/// The persisted lobby record (`game:{code}` in the store).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LobbyRecord {
    pub code: String,
    pub status: GameStatus,
    pub settings: GameSettings,
    pub players: Vec<LobbyPlayer>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub creator_ip: String,
}

impl LobbyRecord {
    #[must_use]
    pub fn new(
        code: String,
        settings: GameSettings,
        creator_name: &str,
        creator_pin: &str,
        creator_ip: String,
        now: DateTime<Utc>,
    ) -> Self {
        let creator = LobbyPlayer {
            id: new_player_id(),
            name: creator_name.to_string(),
            pin_hash: hash_pin(creator_pin),
            ready: false,
            connected: false,
            is_creator: true,
        };
        let creator_id = creator.id.clone();
        Self {
            code,
            status: GameStatus::Lobby,
            settings,
            players: vec![creator],
            creator_id,
            created_at: now,
            last_activity: now,
            creator_ip,
        }
    }

    #[must_use]
    pub fn find_player(&self, player_id: &str) -> Option<&LobbyPlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    #[must_use]
    pub fn find_player_mut(&mut self, player_id: &str) -> Option<&mut LobbyPlayer> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Case-insensitive name lookup, used for joins and reconnects.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&LobbyPlayer> {
        let lower = name.to_lowercase();
        self.players.iter().find(|p| p.name.to_lowercase() == lower)
    }

    /// The PIN-free representation sent to clients.
    #[must_use]
    pub fn view(&self) -> LobbyView {
        LobbyView {
            code: self.code.clone(),
            status: self.status,
            settings: self.settings.clone(),
            players: self
                .players
                .iter()
                .map(|p| LobbyPlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    ready: p.ready,
                    connected: p.connected,
                    is_creator: p.is_creator,
                })
                .collect(),
            creator_id: self.creator_id.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LobbyPlayerView {
    pub id: String,
    pub name: String,
    pub ready: bool,
    pub connected: bool,
    pub is_creator: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LobbyView {
    pub code: String,
    pub status: GameStatus,
    pub settings: GameSettings,
    pub players: Vec<LobbyPlayerView>,
    pub creator_id: String,
}

/// Parameters for creating a game.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewGameRequest {
    pub creator_name: String,
    pub creator_pin: String,
    pub settings: GameSettings,
}

// ------------------------------------------------------------------
// Codes, ids, PINs
// ------------------------------------------------------------------

/// A 6-character room code drawn uniformly from the homoglyph-free
/// alphabet. Collisions are handled by the caller regenerating.
#[must_use]
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let i = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[i] as char
        })
        .collect()
}

#[must_use]
pub fn new_player_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// SHA-256 hex digest of a PIN.
#[must_use]
pub fn hash_pin(pin: &str) -> String {
    let digest = Sha256::digest(pin.as_bytes());
    format!("{digest:x}")
}

#[must_use]
pub fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    hash_pin(pin) == pin_hash
}

#[must_use]
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit())
}

#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= 20
}

/// Bounds checks applied before a game is created.
pub fn validate_settings(settings: &GameSettings) -> Result<(), String> {
    if !(100..=1_000_000).contains(&settings.starting_chips) {
        return Err("starting chips must be between 100 and 1,000,000".to_string());
    }
    if settings.small_blind == 0 {
        return Err("small blind must be greater than 0".to_string());
    }
    if settings.big_blind <= settings.small_blind {
        return Err("big blind must be greater than the small blind".to_string());
    }
    if settings.big_blind > settings.starting_chips {
        return Err("big blind cannot exceed the starting stack".to_string());
    }
    if !(2..=MAX_PLAYERS).contains(&settings.max_players) {
        return Err(format!("max players must be between 2 and {MAX_PLAYERS}"));
    }
    if settings.turn_timeout_seconds > 300 {
        return Err("turn timeout cannot exceed 300 seconds".to_string());
    }
    if settings.blind_level_duration_minutes > 120 {
        return Err("blind level duration cannot exceed 120 minutes".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_pin_hash_round_trip() {
        let hash = hash_pin("1234");
        assert_eq!(hash.len(), 64);
        assert!(verify_pin("1234", &hash));
        assert!(!verify_pin("4321", &hash));
    }

    #[test]
    fn test_pin_hash_matches_known_sha256() {
        // sha256("1234")
        assert_eq!(
            hash_pin("1234"),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
    }

    #[test]
    fn test_is_valid_pin() {
        assert!(is_valid_pin("0000"));
        assert!(is_valid_pin("9876"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin("12a4"));
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let lobby = LobbyRecord::new(
            "ABCDEF".to_string(),
            GameSettings::default(),
            "Alice",
            "1234",
            "127.0.0.1".to_string(),
            Utc::now(),
        );
        assert!(lobby.find_by_name("alice").is_some());
        assert!(lobby.find_by_name("ALICE").is_some());
        assert!(lobby.find_by_name("bob").is_none());
    }

    #[test]
    fn test_view_omits_pin_hash() {
        let lobby = LobbyRecord::new(
            "ABCDEF".to_string(),
            GameSettings::default(),
            "Alice",
            "1234",
            "127.0.0.1".to_string(),
            Utc::now(),
        );
        let json = serde_json::to_string(&lobby.view()).unwrap();
        assert!(!json.contains("pin_hash"));
        assert!(!json.contains(&hash_pin("1234")));
    }

    #[test]
    fn test_validate_settings_bounds() {
        let mut settings = GameSettings::default();
        assert!(validate_settings(&settings).is_ok());

        settings.starting_chips = 50;
        assert!(validate_settings(&settings).is_err());

        settings.starting_chips = 1_000;
        settings.big_blind = 10;
        settings.small_blind = 10;
        assert!(validate_settings(&settings).is_err());

        settings.small_blind = 5;
        settings.max_players = 1;
        assert!(validate_settings(&settings).is_err());
    }
}
