//! Per-viewer state serialization.
//!
//! The engine serializes its full state for every broadcast, but each
//! client only ever sees a filtered view: their own hole cards, other
//! seats' cards only once shown, and valid actions only when it is their
//! turn. Spectators get a view with no private cards at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::engine::GameEngine;
use super::entities::{BlindLevel, Card, Chips, SeatAction, Street};

/// Outcome of the most recent hand, kept until the next deal.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandResult {
    pub winners: Vec<HandWinner>,
    pub pot: Chips,
    pub community_cards: Vec<Card>,
    /// Revealed hole cards: every showdown contender plus voluntary shows.
    pub player_hands: BTreeMap<String, ShownHand>,
    /// Uncalled excess returned without being contested.
    pub refunds: Vec<Refund>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandWinner {
    pub player_id: String,
    pub name: String,
    pub winnings: Chips,
    pub hand: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ShownHand {
    pub cards: Vec<Card>,
    pub hand_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Refund {
    pub player_id: String,
    pub amount: Chips,
}

/// An action the current player may take, with its legal bounds.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ValidAction {
    Fold,
    Check,
    Call { amount: Chips },
    Raise { min_amount: Chips, max_amount: Chips },
    AllIn { amount: Chips },
}

/// One seat as a given viewer sees it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SeatView {
    pub player_id: String,
    pub name: String,
    pub is_creator: bool,
    pub chips: Chips,
    pub bet_this_round: Chips,
    pub bet_this_hand: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub is_sitting_out: bool,
    pub rebuy_queued: bool,
    pub has_shown_cards: bool,
    pub last_action: Option<SeatAction>,
    pub rebuy_count: u32,
    pub eliminated_hand: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<Card>>,
}

/// Final placement once the game is over. Rank 1 is the winner.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub player_id: String,
    pub name: String,
}

/// The authoritative state a single client receives.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EngineView {
    pub game_code: String,
    pub hand_number: u32,
    pub street: Street,
    pub pot: Chips,
    pub community_cards: Vec<Card>,
    pub dealer_player_id: Option<String>,
    pub action_on: Option<String>,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub hand_active: bool,
    pub game_over: bool,
    pub paused: bool,
    pub message: String,
    pub last_hand_result: Option<HandResult>,
    pub players: Vec<SeatView>,
    pub my_cards: Vec<Card>,
    pub valid_actions: Vec<ValidAction>,
    pub turn_timeout: u32,
    pub action_deadline: Option<DateTime<Utc>>,
    pub auto_deal_deadline: Option<DateTime<Utc>>,
    pub game_started_at: DateTime<Utc>,
    pub total_paused_seconds: i64,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub blind_level: usize,
    pub blind_level_duration: u32,
    pub blind_schedule: Vec<BlindLevel>,
    pub next_blind_change_at: Option<DateTime<Utc>>,
    pub allow_rebuys: bool,
    pub max_rebuys: u32,
    pub rebuy_cutoff_minutes: u32,
    pub final_standings: Option<Vec<Standing>>,
}

impl GameEngine {
    /// Build the state view for one player, or for a spectator when
    /// `viewer` is `None`.
    #[must_use]
    pub fn player_view(&self, viewer: Option<&str>, now: DateTime<Utc>) -> EngineView {
        let is_spectator = viewer.is_none();
        let my_cards = viewer
            .and_then(|id| self.find_seat(id))
            .map(|idx| self.seats[idx].hole_cards.clone())
            .unwrap_or_default();

        let players = self
            .seats
            .iter()
            .map(|seat| {
                let own = viewer == Some(seat.player_id.as_str());
                let revealed =
                    !self.hand_active && seat.has_shown_cards && !seat.hole_cards.is_empty();
                let hole_cards = if own || (revealed && !is_spectator) {
                    Some(seat.hole_cards.clone())
                } else {
                    None
                };
                SeatView {
                    player_id: seat.player_id.clone(),
                    name: seat.name.clone(),
                    is_creator: seat.is_creator,
                    chips: seat.chips,
                    bet_this_round: seat.bet_this_round,
                    bet_this_hand: seat.bet_this_hand,
                    folded: seat.folded,
                    all_in: seat.all_in,
                    is_sitting_out: seat.is_sitting_out,
                    rebuy_queued: seat.rebuy_queued,
                    has_shown_cards: seat.has_shown_cards,
                    last_action: seat.last_action,
                    rebuy_count: seat.rebuy_count,
                    eliminated_hand: seat.eliminated_hand,
                    hole_cards,
                }
            })
            .collect();

        let valid_actions = viewer.map_or_else(Vec::new, |id| self.valid_actions(id));
        let blind_level = self.current_blinds();

        EngineView {
            game_code: self.game_code.clone(),
            hand_number: self.hand_number,
            street: self.street,
            pot: self.pot,
            community_cards: self.community_cards.clone(),
            dealer_player_id: self.seats.get(self.dealer_idx).map(|s| s.player_id.clone()),
            action_on: self
                .action_on_idx
                .and_then(|idx| self.seats.get(idx))
                .map(|s| s.player_id.clone()),
            current_bet: self.current_bet,
            min_raise: self.min_raise,
            hand_active: self.hand_active,
            game_over: self.game_over,
            paused: self.paused,
            message: String::new(),
            last_hand_result: self.last_hand_result.clone(),
            players,
            my_cards,
            valid_actions,
            turn_timeout: self.settings.turn_timeout_seconds,
            action_deadline: self.action_deadline,
            auto_deal_deadline: self.auto_deal_deadline,
            game_started_at: self.game_started_at,
            total_paused_seconds: self.total_paused_seconds,
            small_blind: blind_level.small_blind,
            big_blind: blind_level.big_blind,
            blind_level: self.blind_level,
            blind_level_duration: self.settings.blind_level_duration_minutes,
            blind_schedule: self.blind_schedule.clone(),
            next_blind_change_at: self.next_blind_change_at(now),
            allow_rebuys: self.settings.allow_rebuys,
            max_rebuys: self.settings.max_rebuys,
            rebuy_cutoff_minutes: self.settings.rebuy_cutoff_minutes,
            final_standings: self.final_standings(),
        }
    }

    /// Legal moves for the seat currently on action; empty for everyone
    /// else.
    #[must_use]
    pub fn valid_actions(&self, player_id: &str) -> Vec<ValidAction> {
        if !self.hand_active || self.paused {
            return Vec::new();
        }
        let Some(idx) = self.action_on_idx else {
            return Vec::new();
        };
        let seat = &self.seats[idx];
        if seat.player_id != player_id || !seat.can_act() {
            return Vec::new();
        }

        let to_call = self.current_bet.saturating_sub(seat.bet_this_round);
        let mut actions = vec![ValidAction::Fold];

        if to_call == 0 {
            actions.push(ValidAction::Check);
        } else {
            actions.push(ValidAction::Call {
                amount: to_call.min(seat.chips),
            });
        }

        // Raising requires chips beyond the call, and an open action
        // (a short all-in closes it for seats that already acted).
        if seat.chips > to_call && !seat.has_acted {
            let all_in_total = seat.bet_this_round + seat.chips;
            if seat.chips >= self.min_raise + to_call {
                actions.push(ValidAction::Raise {
                    min_amount: self.current_bet + self.min_raise,
                    max_amount: all_in_total,
                });
            } else {
                // A short all-in is the seat's only forward move; present
                // it as a degenerate raise rather than a separate action.
                actions.push(ValidAction::Raise {
                    min_amount: all_in_total,
                    max_amount: all_in_total,
                });
            }
        }
        actions
    }

    fn final_standings(&self) -> Option<Vec<Standing>> {
        if !self.game_over {
            return None;
        }
        let mut standings = Vec::with_capacity(self.seats.len());
        if let Some(winner) = self.seats.iter().find(|s| s.chips > 0) {
            standings.push(Standing {
                rank: 1,
                player_id: winner.player_id.clone(),
                name: winner.name.clone(),
            });
        }
        for id in self.elimination_order.iter().rev() {
            if let Some(idx) = self.find_seat(id) {
                standings.push(Standing {
                    rank: standings.len() + 1,
                    player_id: id.clone(),
                    name: self.seats[idx].name.clone(),
                });
            }
        }
        Some(standings)
    }
}
