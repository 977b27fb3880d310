use rand::{seq::SliceRandom, thread_rng};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::MAX_PLAYERS;

/// Type alias for chip amounts. All bets and stacks are whole chips.
///
/// If the total chips in a game ever surpasses ~4.2 billion, then we may
/// have a problem.
pub type Chips = u32;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    #[serde(rename = "h")]
    Hearts,
    #[serde(rename = "d")]
    Diamonds,
    #[serde(rename = "c")]
    Clubs,
    #[serde(rename = "s")]
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "♥",
            Self::Diamonds => "♦",
            Self::Clubs => "♣",
            Self::Spades => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Card ranks run 2..=14 with 14 as the ace. The wheel straight treats the
/// ace as low, which the evaluator handles explicitly.
pub type Rank = u8;

pub const RANK_TWO: Rank = 2;
pub const RANK_ACE: Rank = 14;

/// A single immutable playing card, serialized as `{"rank": 14, "suit": "s"}`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Parse shorthand like `"Ah"`, `"Ts"`, `"2c"`.
    pub fn from_str_repr(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let rank = match chars.next()?.to_ascii_uppercase() {
            'A' => 14,
            'K' => 13,
            'Q' => 12,
            'J' => 11,
            'T' => 10,
            c => c.to_digit(10).filter(|d| (2..=9).contains(d))? as Rank,
        };
        let suit = match chars.next()?.to_ascii_lowercase() {
            'h' => Suit::Hearts,
            'd' => Suit::Diamonds,
            'c' => Suit::Clubs,
            's' => Suit::Spades,
            _ => return None,
        };
        if chars.next().is_some() {
            return None;
        }
        Some(Self { rank, suit })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.rank {
            14 => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            11 => "J".to_string(),
            10 => "T".to_string(),
            r => r.to_string(),
        };
        write!(f, "{rank}{}", self.suit)
    }
}

/// An ordered deck. `deal` consumes from the front so a serialized mid-hand
/// deck restores to the identical remaining sequence.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A fresh 52-card deck shuffled with the thread-local CSPRNG.
    #[must_use]
    pub fn new_shuffled() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in RANK_TWO..=RANK_ACE {
                cards.push(Card::new(rank, suit));
            }
        }
        cards.shuffle(&mut thread_rng());
        Self { cards }
    }

    /// A deck with a fixed order. Used to restore snapshots and to stack
    /// decks in tests.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Remove and return the first `n` cards.
    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if n > self.cards.len() {
            return Err(DeckError::Exhausted {
                requested: n,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.drain(..n).collect())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DeckError {
    #[error("deck exhausted: requested {requested}, {remaining} remaining")]
    Exhausted { requested: usize, remaining: usize },
}

/// The current betting round, or the gap between hands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Between,
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::Between => "between",
        };
        write!(f, "{repr}")
    }
}

/// A player action as submitted over the wire. Raise amounts are raise-to
/// totals for the current street.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise { amount: Chips },
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "folds".to_string(),
            Self::Check => "checks".to_string(),
            Self::Call => "calls".to_string(),
            Self::Raise { amount } => format!("raises to {amount}"),
            Self::AllIn => "goes all-in".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// The kind of a seat's most recent action, kept for display.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatAction {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

/// Per-seat state. Seats are ordered by join order and never reordered, so
/// dealer rotation and elimination bookkeeping can use indices.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerSeat {
    pub player_id: String,
    pub name: String,
    pub pin_hash: String,
    pub is_creator: bool,
    pub chips: Chips,
    #[serde(default)]
    pub hole_cards: Vec<Card>,
    #[serde(default)]
    pub bet_this_round: Chips,
    #[serde(default)]
    pub bet_this_hand: Chips,
    #[serde(default)]
    pub folded: bool,
    #[serde(default)]
    pub all_in: bool,
    /// Whether the seat has acted since the last full raise this street.
    /// Posting a blind does not count as acting.
    #[serde(default)]
    pub has_acted: bool,
    #[serde(default)]
    pub is_sitting_out: bool,
    #[serde(default)]
    pub rebuy_queued: bool,
    #[serde(default)]
    pub has_shown_cards: bool,
    #[serde(default)]
    pub last_action: Option<SeatAction>,
    #[serde(default)]
    pub rebuy_count: u32,
    #[serde(default)]
    pub eliminated_hand: Option<u32>,
}

impl PlayerSeat {
    #[must_use]
    pub fn new(
        player_id: impl Into<String>,
        name: impl Into<String>,
        pin_hash: impl Into<String>,
        is_creator: bool,
        chips: Chips,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            pin_hash: pin_hash.into(),
            is_creator,
            chips,
            hole_cards: Vec::with_capacity(2),
            bet_this_round: 0,
            bet_this_hand: 0,
            folded: false,
            all_in: false,
            has_acted: false,
            is_sitting_out: false,
            rebuy_queued: false,
            has_shown_cards: false,
            last_action: None,
            rebuy_count: 0,
            eliminated_hand: None,
        }
    }

    /// Still in the hand with chips behind and a decision to make.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.folded && !self.all_in && !self.is_sitting_out && self.chips > 0
    }

    /// Dealt into the current hand and not folded.
    #[must_use]
    pub fn in_hand(&self) -> bool {
        !self.folded && !self.is_sitting_out
    }

    pub fn reset_for_new_hand(&mut self) {
        self.hole_cards.clear();
        self.bet_this_round = 0;
        self.bet_this_hand = 0;
        self.folded = false;
        self.all_in = false;
        self.has_acted = false;
        self.has_shown_cards = false;
        self.last_action = None;
    }

    pub fn reset_for_new_round(&mut self) {
        self.bet_this_round = 0;
        self.has_acted = false;
    }
}

/// A (side) pot: an amount and the seats eligible to win it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible_player_ids: Vec<String>,
}

/// One blind level of the schedule.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlindLevel {
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl fmt::Display for BlindLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.small_blind, self.big_blind)
    }
}

/// Frozen-at-creation game settings. Fields omitted from a creation
/// request fall back to the defaults below.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GameSettings {
    pub starting_chips: Chips,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub max_players: usize,
    pub allow_rebuys: bool,
    /// 0 = unlimited.
    pub max_rebuys: u32,
    /// 0 = no cutoff.
    pub rebuy_cutoff_minutes: u32,
    /// 0 = no turn timer.
    pub turn_timeout_seconds: u32,
    /// 0 = fixed blinds for the whole game.
    pub blind_level_duration_minutes: u32,
    /// Target game length for escalating blind schedules. Ignored when
    /// `blind_level_duration_minutes` is 0.
    pub target_game_minutes: u32,
    pub auto_deal_enabled: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            starting_chips: 1_000,
            small_blind: 10,
            big_blind: 20,
            max_players: MAX_PLAYERS,
            allow_rebuys: true,
            max_rebuys: 1,
            rebuy_cutoff_minutes: 60,
            turn_timeout_seconds: 0,
            blind_level_duration_minutes: 0,
            target_game_minutes: super::constants::DEFAULT_TARGET_GAME_MINUTES,
            auto_deal_enabled: true,
        }
    }
}
