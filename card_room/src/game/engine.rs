//! The authoritative hold'em state machine.
//!
//! A `GameEngine` is a deterministic function of its serialized state plus
//! the incoming operation: every method that depends on the clock takes
//! `now` explicitly, and nothing here performs I/O. The session coordinator
//! owns loading, locking, persisting, and broadcasting.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::blinds;
use super::constants::AUTO_DEAL_DELAY;
use super::entities::{
    Action, BlindLevel, Card, Chips, Deck, DeckError, GameSettings, PlayerSeat, Pot, SeatAction,
    Street,
};
use super::evaluator::{self, HandRank};
use super::view::{HandResult, HandWinner, Refund, ShownHand};

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EngineError {
    #[error("game is over")]
    GameOver,
    #[error("hand already in progress")]
    HandInProgress,
    #[error("no active hand")]
    NoActiveHand,
    #[error("need 2+ players with chips")]
    NotEnoughPlayers,
    #[error("unknown player")]
    PlayerNotFound,
    #[error("not your turn")]
    OutOfTurn,
    #[error("cannot check, must call or fold")]
    CheckNotAllowed,
    #[error("raise must be at least {min}")]
    RaiseTooSmall { min: Chips },
    #[error("raise exceeds stack")]
    RaiseExceedsStack,
    #[error("betting is closed until the next full raise")]
    BettingClosed,
    #[error("game is paused")]
    Paused,
    #[error("game is not paused")]
    NotPaused,
    #[error("cannot pause during a hand")]
    PauseDuringHand,
    #[error("already paused")]
    AlreadyPaused,
    #[error("rebuys are not allowed")]
    RebuysDisabled,
    #[error("rebuy window has closed")]
    RebuyWindowClosed,
    #[error("no rebuys remaining")]
    RebuyLimitReached,
    #[error("player still has chips")]
    StillHasChips,
    #[error("cannot show cards right now")]
    CannotShowHand,
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// Raised only by [`GameEngine::check_invariants`]; indicates corrupted
/// state that must not be persisted.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("engine invariant violated: {0}")]
pub struct InvariantViolation(pub String);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameEngine {
    pub game_code: String,
    pub settings: GameSettings,
    pub seats: Vec<PlayerSeat>,
    pub dealer_idx: usize,
    pub hand_number: u32,
    pub street: Street,
    pub deck: Deck,
    pub community_cards: Vec<Card>,
    /// Every chip posted this hand, including the current round's bets.
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub action_on_idx: Option<usize>,
    pub last_raiser_idx: Option<usize>,
    pub hand_active: bool,
    pub game_started_at: DateTime<Utc>,
    pub paused: bool,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub total_paused_seconds: i64,
    pub action_deadline: Option<DateTime<Utc>>,
    pub auto_deal_deadline: Option<DateTime<Utc>>,
    pub blind_schedule: Vec<BlindLevel>,
    pub blind_level: usize,
    pub game_over: bool,
    pub elimination_order: Vec<String>,
    pub last_hand_result: Option<HandResult>,
}

impl GameEngine {
    /// Seat the given players (join order) and freeze settings. No hand is
    /// dealt; the game sits `Between` until the first `start_hand`.
    #[must_use]
    pub fn new(
        game_code: impl Into<String>,
        settings: GameSettings,
        seats: Vec<PlayerSeat>,
        now: DateTime<Utc>,
    ) -> Self {
        let blind_schedule = if settings.blind_level_duration_minutes == 0 {
            vec![BlindLevel {
                small_blind: settings.small_blind,
                big_blind: settings.big_blind,
            }]
        } else {
            blinds::build_schedule(
                settings.starting_chips,
                settings.blind_level_duration_minutes,
                settings.target_game_minutes,
            )
        };

        Self {
            game_code: game_code.into(),
            settings,
            seats,
            dealer_idx: 0,
            hand_number: 0,
            street: Street::Between,
            deck: Deck::new_shuffled(),
            community_cards: Vec::with_capacity(5),
            pot: 0,
            current_bet: 0,
            min_raise: 0,
            action_on_idx: None,
            last_raiser_idx: None,
            hand_active: false,
            game_started_at: now,
            paused: false,
            pause_started_at: None,
            total_paused_seconds: 0,
            action_deadline: None,
            auto_deal_deadline: None,
            blind_schedule,
            blind_level: 0,
            game_over: false,
            elimination_order: Vec::new(),
            last_hand_result: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn find_seat(&self, player_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    /// Seconds of unpaused play since the game started.
    #[must_use]
    pub fn effective_elapsed(&self, now: DateTime<Utc>) -> i64 {
        let mut paused = self.total_paused_seconds;
        if self.paused {
            if let Some(started) = self.pause_started_at {
                paused += (now - started).num_seconds().max(0);
            }
        }
        ((now - self.game_started_at).num_seconds() - paused).max(0)
    }

    #[must_use]
    pub fn current_blinds(&self) -> BlindLevel {
        let idx = self.blind_level.min(self.blind_schedule.len() - 1);
        self.blind_schedule[idx]
    }

    /// Wall time of the next blind increase, if the clock is running.
    #[must_use]
    pub fn next_blind_change_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let duration_secs = i64::from(self.settings.blind_level_duration_minutes) * 60;
        if duration_secs == 0 || self.game_over || self.paused {
            return None;
        }
        let level_end = (self.blind_level as i64 + 1) * duration_secs;
        let remaining = level_end - self.effective_elapsed(now);
        Some(now + Duration::seconds(remaining.max(0)))
    }

    /// Recompute the blind level from the clock, extending the schedule at
    /// 1.5x per level when play has outlived it.
    pub fn sync_blind_level(&mut self, now: DateTime<Utc>) {
        let duration_secs = i64::from(self.settings.blind_level_duration_minutes) * 60;
        if duration_secs == 0 || self.game_over {
            return;
        }
        let raw = (self.effective_elapsed(now) / duration_secs) as usize;
        while raw >= self.blind_schedule.len() {
            let last = self.blind_schedule[self.blind_schedule.len() - 1].big_blind;
            let next = blinds::next_overtime_blind(last);
            self.blind_schedule.push(BlindLevel {
                small_blind: blinds::small_blind_for(next),
                big_blind: next,
            });
        }
        self.blind_level = raw.min(self.blind_schedule.len() - 1);
    }

    /// Whether `seat` may rebuy right now: rebuys enabled, busted, under
    /// the rebuy limit, and inside the cutoff window of unpaused play.
    #[must_use]
    pub fn rebuy_allowed(&self, seat: &PlayerSeat, now: DateTime<Utc>) -> bool {
        if !self.settings.allow_rebuys || seat.chips > 0 {
            return false;
        }
        if self.settings.max_rebuys > 0 && seat.rebuy_count >= self.settings.max_rebuys {
            return false;
        }
        if self.settings.rebuy_cutoff_minutes > 0 {
            let cutoff = i64::from(self.settings.rebuy_cutoff_minutes) * 60;
            if self.effective_elapsed(now) >= cutoff {
                return false;
            }
        }
        true
    }

    fn next_live_seat(&self, from: usize) -> Option<usize> {
        let n = self.seats.len();
        for offset in 1..=n {
            let i = (from + offset) % n;
            let s = &self.seats[i];
            if !s.is_sitting_out && s.chips > 0 {
                return Some(i);
            }
        }
        None
    }

    /// The next seat after `from` that still owes a decision this round.
    fn next_actionable_seat(&self, from: usize) -> Option<usize> {
        let n = self.seats.len();
        for offset in 1..=n {
            let i = (from + offset) % n;
            let s = &self.seats[i];
            if s.can_act() && !(s.has_acted && s.bet_this_round == self.current_bet) {
                return Some(i);
            }
        }
        None
    }

    fn seats_in_hand(&self) -> Vec<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.in_hand())
            .map(|(i, _)| i)
            .collect()
    }

    fn count_can_act(&self) -> usize {
        self.seats.iter().filter(|s| s.can_act()).count()
    }

    // ------------------------------------------------------------------
    // Hand lifecycle
    // ------------------------------------------------------------------

    /// Deal a new hand: fulfill queued rebuys, rotate the button, post
    /// blinds, deal hole cards, and open preflop action.
    pub fn start_hand(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.hand_active {
            return Err(EngineError::HandInProgress);
        }
        if self.paused {
            return Err(EngineError::Paused);
        }

        for idx in 0..self.seats.len() {
            if self.seats[idx].rebuy_queued {
                self.fulfill_rebuy(idx);
            }
        }

        let live: Vec<usize> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_sitting_out && s.chips > 0)
            .map(|(i, _)| i)
            .collect();
        if live.len() < 2 {
            return Err(EngineError::NotEnoughPlayers);
        }

        self.sync_blind_level(now);
        self.hand_number += 1;
        self.last_hand_result = None;
        self.auto_deal_deadline = None;

        for seat in &mut self.seats {
            seat.reset_for_new_hand();
        }

        if self.hand_number > 1 {
            if let Some(next) = self.next_live_seat(self.dealer_idx) {
                self.dealer_idx = next;
            }
        } else if !live.contains(&self.dealer_idx) {
            self.dealer_idx = live[0];
        }

        self.deck = Deck::new_shuffled();
        self.community_cards.clear();
        self.street = Street::Preflop;
        self.pot = 0;
        self.last_raiser_idx = None;
        self.hand_active = true;

        for &idx in &live {
            self.seats[idx].hole_cards = self.deck.deal(2)?;
        }

        // Heads-up: the dealer posts the small blind and acts first preflop.
        let blind_level = self.current_blinds();
        let (sb_idx, bb_idx) = if live.len() == 2 {
            let sb = self.dealer_idx;
            let bb = self.next_live_seat(sb).unwrap_or(sb);
            (sb, bb)
        } else {
            let sb = self.next_live_seat(self.dealer_idx).unwrap_or(self.dealer_idx);
            let bb = self.next_live_seat(sb).unwrap_or(sb);
            (sb, bb)
        };
        self.force_bet(sb_idx, blind_level.small_blind);
        self.force_bet(bb_idx, blind_level.big_blind);
        self.current_bet = blind_level.big_blind;
        self.min_raise = blind_level.big_blind;

        self.action_on_idx = self.next_actionable_seat(bb_idx);
        if self.action_on_idx.is_none() || self.is_round_complete() {
            // Blinds put everyone all-in; run the board out.
            self.end_betting_round(now)?;
        }
        self.refresh_action_deadline(now);
        Ok(())
    }

    fn force_bet(&mut self, idx: usize, amount: Chips) {
        let posted = amount.min(self.seats[idx].chips);
        self.put_chips(idx, posted);
    }

    fn put_chips(&mut self, idx: usize, amount: Chips) {
        let seat = &mut self.seats[idx];
        debug_assert!(amount <= seat.chips);
        seat.chips -= amount;
        seat.bet_this_round += amount;
        seat.bet_this_hand += amount;
        self.pot += amount;
        if seat.chips == 0 {
            seat.all_in = true;
        }
    }

    fn fulfill_rebuy(&mut self, idx: usize) {
        let starting = self.settings.starting_chips;
        let seat = &mut self.seats[idx];
        seat.chips = starting;
        seat.is_sitting_out = false;
        seat.rebuy_queued = false;
        seat.rebuy_count += 1;
        seat.eliminated_hand = None;
        let id = seat.player_id.clone();
        self.elimination_order.retain(|p| *p != id);
    }

    // ------------------------------------------------------------------
    // Action processing
    // ------------------------------------------------------------------

    pub fn process_action(
        &mut self,
        player_id: &str,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if !self.hand_active {
            return Err(EngineError::NoActiveHand);
        }
        if self.paused {
            return Err(EngineError::Paused);
        }
        let idx = self
            .find_seat(player_id)
            .ok_or(EngineError::PlayerNotFound)?;
        if self.action_on_idx != Some(idx) {
            return Err(EngineError::OutOfTurn);
        }

        let to_call = self
            .current_bet
            .saturating_sub(self.seats[idx].bet_this_round);

        match action {
            Action::Fold => {
                let seat = &mut self.seats[idx];
                seat.folded = true;
                seat.has_acted = true;
                seat.last_action = Some(SeatAction::Fold);
            }
            Action::Check => {
                if to_call > 0 {
                    return Err(EngineError::CheckNotAllowed);
                }
                let seat = &mut self.seats[idx];
                seat.has_acted = true;
                seat.last_action = Some(SeatAction::Check);
            }
            Action::Call => {
                let amount = to_call.min(self.seats[idx].chips);
                self.put_chips(idx, amount);
                let seat = &mut self.seats[idx];
                seat.has_acted = true;
                seat.last_action = Some(if seat.all_in {
                    SeatAction::AllIn
                } else {
                    SeatAction::Call
                });
            }
            Action::Raise { amount } => self.apply_raise(idx, amount)?,
            Action::AllIn => self.apply_all_in(idx)?,
        }

        let in_hand = self.seats_in_hand();
        if in_hand.len() == 1 {
            self.award_fold_win(in_hand[0], now);
        } else if self.is_round_complete() {
            self.end_betting_round(now)?;
        } else {
            self.action_on_idx = self.next_actionable_seat(idx);
        }
        self.refresh_action_deadline(now);
        Ok(())
    }

    /// `raise_to` is the seat's total for this street after the raise.
    fn apply_raise(&mut self, idx: usize, raise_to: Chips) -> Result<(), EngineError> {
        let seat = &self.seats[idx];
        if seat.has_acted {
            // A short all-in bumped the bet without reopening the action.
            return Err(EngineError::BettingClosed);
        }
        let min_to = self.current_bet + self.min_raise;
        let additional = raise_to
            .checked_sub(seat.bet_this_round)
            .filter(|_| raise_to > self.current_bet)
            .ok_or(EngineError::RaiseTooSmall { min: min_to })?;
        if additional > seat.chips {
            return Err(EngineError::RaiseExceedsStack);
        }
        let is_all_in = additional == seat.chips;
        if raise_to < min_to && !is_all_in {
            return Err(EngineError::RaiseTooSmall { min: min_to });
        }

        let raise_size = raise_to - self.current_bet;
        self.put_chips(idx, additional);
        if raise_size >= self.min_raise {
            self.min_raise = raise_size;
            self.reopen_action(idx);
        }
        self.current_bet = raise_to;
        self.last_raiser_idx = Some(idx);
        let seat = &mut self.seats[idx];
        seat.has_acted = true;
        seat.last_action = Some(if seat.all_in {
            SeatAction::AllIn
        } else {
            SeatAction::Raise
        });
        Ok(())
    }

    fn apply_all_in(&mut self, idx: usize) -> Result<(), EngineError> {
        let seat = &self.seats[idx];
        let new_total = seat.bet_this_round + seat.chips;
        if new_total > self.current_bet {
            if seat.has_acted {
                return Err(EngineError::BettingClosed);
            }
            let raise_size = new_total - self.current_bet;
            if raise_size >= self.min_raise {
                self.min_raise = raise_size;
                self.reopen_action(idx);
            }
            self.current_bet = new_total;
            self.last_raiser_idx = Some(idx);
        }
        let amount = self.seats[idx].chips;
        self.put_chips(idx, amount);
        let seat = &mut self.seats[idx];
        seat.has_acted = true;
        seat.last_action = Some(SeatAction::AllIn);
        Ok(())
    }

    /// A full raise gives everyone still able to act a fresh decision.
    fn reopen_action(&mut self, raiser_idx: usize) {
        for (i, seat) in self.seats.iter_mut().enumerate() {
            if i != raiser_idx && seat.can_act() {
                seat.has_acted = false;
            }
        }
    }

    fn is_round_complete(&self) -> bool {
        self.seats
            .iter()
            .filter(|s| s.can_act())
            .all(|s| s.has_acted && s.bet_this_round == self.current_bet)
    }

    // ------------------------------------------------------------------
    // Street advancement & showdown
    // ------------------------------------------------------------------

    fn end_betting_round(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        loop {
            for seat in &mut self.seats {
                seat.reset_for_new_round();
            }
            self.current_bet = 0;
            self.min_raise = self.current_blinds().big_blind;
            self.last_raiser_idx = None;

            match self.street {
                Street::Preflop => {
                    let flop = self.deck.deal(3)?;
                    self.community_cards.extend(flop);
                    self.street = Street::Flop;
                }
                Street::Flop => {
                    let turn = self.deck.deal(1)?;
                    self.community_cards.extend(turn);
                    self.street = Street::Turn;
                }
                Street::Turn => {
                    let river = self.deck.deal(1)?;
                    self.community_cards.extend(river);
                    self.street = Street::River;
                }
                Street::River => {
                    self.showdown(now);
                    return Ok(());
                }
                Street::Showdown | Street::Between => {
                    debug_assert!(false, "betting round outside an active hand");
                    return Ok(());
                }
            }

            // With fewer than two seats able to act there is no more
            // betting; run the remaining streets out.
            if self.count_can_act() < 2 {
                continue;
            }

            self.action_on_idx = self.next_actionable_seat(self.dealer_idx);
            return Ok(());
        }
    }

    /// Everyone else folded: the pot goes uncontested.
    fn award_fold_win(&mut self, winner_idx: usize, now: DateTime<Utc>) {
        let pot = self.pot;
        self.seats[winner_idx].chips += pot;
        self.pot = 0;

        let winner = &self.seats[winner_idx];
        self.last_hand_result = Some(HandResult {
            winners: vec![HandWinner {
                player_id: winner.player_id.clone(),
                name: winner.name.clone(),
                winnings: pot,
                hand: "Last player standing".to_string(),
            }],
            pot,
            community_cards: self.community_cards.clone(),
            player_hands: self.shown_hands(),
            refunds: Vec::new(),
        });
        self.finish_hand(now);
    }

    fn showdown(&mut self, now: DateTime<Utc>) {
        self.street = Street::Showdown;

        for seat in &mut self.seats {
            if seat.in_hand() {
                seat.has_shown_cards = true;
            }
        }

        let mut player_hands: HashMap<String, HandRank> = HashMap::new();
        for seat in self.seats.iter().filter(|s| s.in_hand()) {
            let mut cards = seat.hole_cards.clone();
            cards.extend(self.community_cards.iter().copied());
            if let Some(rank) = evaluator::evaluate(&cards) {
                player_hands.insert(seat.player_id.clone(), rank);
            }
        }

        let refunds = self.refund_uncalled_excess();
        let pots = self.build_side_pots();
        let awarded: Chips = pots.iter().map(|p| p.amount).sum();

        let mut winners_by_id: HashMap<String, HandWinner> = HashMap::new();
        let award_order = self.award_order();
        for pot in &pots {
            let eligible_hands: HashMap<String, HandRank> = player_hands
                .iter()
                .filter(|(id, _)| pot.eligible_player_ids.contains(*id))
                .map(|(id, rank)| (id.clone(), rank.clone()))
                .collect();
            let winner_ids = evaluator::determine_winners(&eligible_hands);
            if winner_ids.is_empty() {
                continue;
            }
            // Odd chips go to the earliest winner in seat order from the
            // first seat left of the dealer.
            let ordered: Vec<&String> = award_order
                .iter()
                .filter(|id| winner_ids.contains(*id))
                .collect();
            let share = pot.amount / ordered.len() as Chips;
            let remainder = pot.amount % ordered.len() as Chips;
            for (i, id) in ordered.iter().enumerate() {
                let winnings = share + Chips::from((i as Chips) < remainder);
                let idx = self.find_seat(id).expect("winner is seated");
                self.seats[idx].chips += winnings;
                let entry = winners_by_id
                    .entry((*id).clone())
                    .or_insert_with(|| HandWinner {
                        player_id: (*id).clone(),
                        name: self.seats[idx].name.clone(),
                        winnings: 0,
                        hand: player_hands
                            .get(*id)
                            .map_or_else(|| "Unknown".to_string(), HandRank::describe),
                    });
                entry.winnings += winnings;
            }
        }
        self.pot = 0;

        // Seat order keeps the result stable for clients.
        let mut winners: Vec<HandWinner> = Vec::new();
        for id in &award_order {
            if let Some(w) = winners_by_id.remove(id) {
                winners.push(w);
            }
        }

        let mut player_hand_views = self.shown_hands();
        for (id, rank) in &player_hands {
            if let Some(shown) = player_hand_views.get_mut(id) {
                shown.hand_name = Some(rank.describe());
            }
        }

        self.last_hand_result = Some(HandResult {
            winners,
            pot: awarded,
            community_cards: self.community_cards.clone(),
            player_hands: player_hand_views,
            refunds,
        });
        self.finish_hand(now);
    }

    /// If the deepest contribution was not called in full, return the
    /// excess to its owner before the pots are built.
    fn refund_uncalled_excess(&mut self) -> Vec<Refund> {
        let mut deepest: Option<usize> = None;
        let mut max = 0;
        let mut second = 0;
        let mut max_count = 0;
        for (i, seat) in self.seats.iter().enumerate() {
            let bet = seat.bet_this_hand;
            if bet > max {
                second = max;
                max = bet;
                deepest = Some(i);
                max_count = 1;
            } else if bet == max && bet > 0 {
                max_count += 1;
            } else if bet > second {
                second = bet;
            }
        }

        let Some(idx) = deepest else {
            return Vec::new();
        };
        if max_count > 1 || max == second {
            return Vec::new();
        }
        let excess = max - second;
        let seat = &mut self.seats[idx];
        seat.bet_this_hand -= excess;
        seat.chips += excess;
        self.pot -= excess;
        vec![Refund {
            player_id: seat.player_id.clone(),
            amount: excess,
        }]
    }

    /// Layer contributions into a main pot and strictly narrowing side pots.
    fn build_side_pots(&self) -> Vec<Pot> {
        let mut working: Vec<Chips> = self.seats.iter().map(|s| s.bet_this_hand).collect();
        let mut pots: Vec<Pot> = Vec::new();

        loop {
            let Some(layer) = working.iter().copied().filter(|&b| b > 0).min() else {
                break;
            };
            let contributors: Vec<usize> = (0..working.len())
                .filter(|&i| working[i] > 0)
                .collect();
            let amount = layer * contributors.len() as Chips;
            let eligible: Vec<String> = contributors
                .iter()
                .filter(|&&i| self.seats[i].in_hand())
                .map(|&i| self.seats[i].player_id.clone())
                .collect();
            for &i in &contributors {
                working[i] -= layer;
            }
            // A layer funded only by folders widens nothing; merge it.
            match pots.last_mut() {
                Some(last) if last.eligible_player_ids == eligible => last.amount += amount,
                _ => pots.push(Pot {
                    amount,
                    eligible_player_ids: eligible,
                }),
            }
        }
        pots
    }

    /// Player ids in seat order starting one seat left of the dealer.
    fn award_order(&self) -> Vec<String> {
        let n = self.seats.len();
        (1..=n)
            .map(|offset| self.seats[(self.dealer_idx + offset) % n].player_id.clone())
            .collect()
    }

    /// Post-hand bookkeeping: eliminations, game-over detection, auto-deal.
    fn finish_hand(&mut self, now: DateTime<Utc>) {
        self.hand_active = false;
        self.street = Street::Between;
        self.action_on_idx = None;
        self.action_deadline = None;
        self.last_raiser_idx = None;
        self.current_bet = 0;

        let hand_number = self.hand_number;
        for seat in &mut self.seats {
            if seat.chips == 0 && !seat.is_sitting_out {
                seat.is_sitting_out = true;
                seat.eliminated_hand = Some(hand_number);
            }
        }
        for i in 0..self.seats.len() {
            let seat = &self.seats[i];
            if seat.eliminated_hand.is_some()
                && !self.elimination_order.contains(&seat.player_id)
            {
                let id = seat.player_id.clone();
                self.elimination_order.push(id);
            }
        }

        let with_chips = self.seats.iter().filter(|s| s.chips > 0).count();
        let rebuy_possible = self
            .seats
            .iter()
            .any(|s| s.chips == 0 && self.rebuy_allowed(s, now));
        if with_chips <= 1 && !rebuy_possible {
            self.game_over = true;
            self.auto_deal_deadline = None;
        } else if self.settings.auto_deal_enabled {
            self.auto_deal_deadline = Some(now + AUTO_DEAL_DELAY);
        }
    }

    fn refresh_action_deadline(&mut self, now: DateTime<Utc>) {
        let timeout = self.settings.turn_timeout_seconds;
        self.action_deadline = if self.hand_active && self.action_on_idx.is_some() && timeout > 0
        {
            Some(now + Duration::seconds(i64::from(timeout)))
        } else {
            None
        };
    }

    /// Hole cards currently on voluntary or showdown display, keyed by
    /// player id.
    fn shown_hands(&self) -> std::collections::BTreeMap<String, ShownHand> {
        self.seats
            .iter()
            .filter(|s| s.has_shown_cards && !s.hole_cards.is_empty())
            .map(|s| {
                (
                    s.player_id.clone(),
                    ShownHand {
                        cards: s.hole_cards.clone(),
                        hand_name: None,
                    },
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Rebuys, showing, pause
    // ------------------------------------------------------------------

    /// Rebuy immediately between hands, or queue during one.
    pub fn request_rebuy(
        &mut self,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if !self.settings.allow_rebuys {
            return Err(EngineError::RebuysDisabled);
        }
        let idx = self
            .find_seat(player_id)
            .ok_or(EngineError::PlayerNotFound)?;
        let seat = &self.seats[idx];
        if seat.chips > 0 {
            return Err(EngineError::StillHasChips);
        }
        if self.settings.max_rebuys > 0 && seat.rebuy_count >= self.settings.max_rebuys {
            return Err(EngineError::RebuyLimitReached);
        }
        if !self.rebuy_allowed(seat, now) {
            return Err(EngineError::RebuyWindowClosed);
        }

        if self.hand_active {
            self.seats[idx].rebuy_queued = true;
        } else {
            self.fulfill_rebuy(idx);
        }
        Ok(())
    }

    pub fn cancel_rebuy(&mut self, player_id: &str) -> Result<(), EngineError> {
        let idx = self
            .find_seat(player_id)
            .ok_or(EngineError::PlayerNotFound)?;
        self.seats[idx].rebuy_queued = false;
        Ok(())
    }

    /// Voluntarily reveal hole cards between hands. Also patches the last
    /// hand result so late reveals reach every client.
    pub fn show_cards(&mut self, player_id: &str) -> Result<(), EngineError> {
        let idx = self
            .find_seat(player_id)
            .ok_or(EngineError::PlayerNotFound)?;
        if self.hand_active {
            return Err(EngineError::CannotShowHand);
        }
        if self.seats[idx].hole_cards.is_empty() {
            return Err(EngineError::CannotShowHand);
        }
        self.seats[idx].has_shown_cards = true;

        let seat = &self.seats[idx];
        let mut cards = seat.hole_cards.clone();
        cards.extend(self.community_cards.iter().copied());
        let hand_name = evaluator::evaluate(&cards).map(|r| r.describe());
        if let Some(result) = &mut self.last_hand_result {
            result
                .player_hands
                .entry(seat.player_id.clone())
                .or_insert(ShownHand {
                    cards: seat.hole_cards.clone(),
                    hand_name,
                });
        }
        Ok(())
    }

    /// Pause the game clock. Legal only between hands.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.hand_active {
            return Err(EngineError::PauseDuringHand);
        }
        if self.paused {
            return Err(EngineError::AlreadyPaused);
        }
        self.paused = true;
        self.pause_started_at = Some(now);
        self.auto_deal_deadline = None;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if !self.paused {
            return Err(EngineError::NotPaused);
        }
        if let Some(started) = self.pause_started_at {
            self.total_paused_seconds += (now - started).num_seconds().max(0);
        }
        self.paused = false;
        self.pause_started_at = None;
        if self.settings.auto_deal_enabled && !self.game_over && !self.hand_active {
            self.auto_deal_deadline = Some(now + AUTO_DEAL_DELAY);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Structural checks run before every persist. A failure means the new
    /// state must be discarded.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let rebuys: u64 = self.seats.iter().map(|s| u64::from(s.rebuy_count)).sum();
        let expected = self.seats.len() as u64 * u64::from(self.settings.starting_chips)
            + rebuys * u64::from(self.settings.starting_chips);
        let actual: u64 =
            self.seats.iter().map(|s| u64::from(s.chips)).sum::<u64>() + u64::from(self.pot);
        if actual != expected {
            return Err(InvariantViolation(format!(
                "chips not conserved: have {actual}, expected {expected}"
            )));
        }

        for seat in &self.seats {
            if seat.bet_this_round > seat.bet_this_hand {
                return Err(InvariantViolation(format!(
                    "seat {} round bet exceeds hand bet",
                    seat.player_id
                )));
            }
        }

        if self.seats.iter().filter(|s| s.is_creator).count() > 1 {
            return Err(InvariantViolation("multiple creators".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for id in &self.elimination_order {
            if !seen.insert(id) {
                return Err(InvariantViolation(format!(
                    "duplicate elimination entry {id}"
                )));
            }
            if self.find_seat(id).is_none() {
                return Err(InvariantViolation(format!("unknown eliminated player {id}")));
            }
        }

        if let Some(idx) = self.action_on_idx {
            let ok = self
                .seats
                .get(idx)
                .is_some_and(|s| s.can_act());
            if !ok {
                return Err(InvariantViolation(format!(
                    "action on seat {idx} which cannot act"
                )));
            }
        }
        Ok(())
    }
}
