//! End-to-end engine scenarios: full hands played move by move against
//! rigged decks, checking pots, side pots, refunds, and eliminations.

use chrono::Utc;
use card_room::game::entities::{Action, Card, Chips, Deck, GameSettings, PlayerSeat, Street};
use card_room::game::engine::GameEngine;

fn card(repr: &str) -> Card {
    Card::from_str_repr(repr).expect("valid card repr")
}

fn cards(reprs: &[&str]) -> Vec<Card> {
    reprs.iter().map(|r| card(r)).collect()
}

fn settings(chips: Chips) -> GameSettings {
    GameSettings {
        starting_chips: chips,
        small_blind: 10,
        big_blind: 20,
        allow_rebuys: false,
        ..GameSettings::default()
    }
}

fn engine_with_players(names: &[&str], chips: Chips) -> GameEngine {
    let seats = names
        .iter()
        .enumerate()
        .map(|(i, name)| PlayerSeat::new(format!("p{i}"), *name, "hash", i == 0, chips))
        .collect();
    GameEngine::new("SCENAR", settings(chips), seats, Utc::now())
}

fn chips_in_play(engine: &GameEngine) -> u64 {
    engine.seats.iter().map(|s| u64::from(s.chips)).sum::<u64>() + u64::from(engine.pot)
}

/// Heads-up checked-down showdown: kings beat queens, winner collects the
/// blinds.
#[test]
fn simple_showdown_heads_up() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["alice", "bob"], 1_000);
    engine.start_hand(now).unwrap();

    // Alice (p0) is dealer and small blind; Bob (p1) posts the big blind.
    engine.seats[0].hole_cards = cards(&["Ks", "Kc"]);
    engine.seats[1].hole_cards = cards(&["Qs", "Qc"]);
    engine.deck = Deck::from_cards(cards(&["7h", "2d", "5c", "9s", "3d"]));

    engine.process_action("p0", Action::Call, now).unwrap();
    engine.process_action("p1", Action::Check, now).unwrap();
    assert_eq!(engine.street, Street::Flop);

    // Big blind acts first on every postflop street.
    for _ in 0..3 {
        engine.process_action("p1", Action::Check, now).unwrap();
        engine.process_action("p0", Action::Check, now).unwrap();
    }

    assert!(!engine.hand_active);
    assert_eq!(engine.seats[0].chips, 1_020);
    assert_eq!(engine.seats[1].chips, 980);

    let result = engine.last_hand_result.as_ref().unwrap();
    assert_eq!(result.pot, 40);
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].player_id, "p0");
    assert_eq!(result.winners[0].winnings, 40);
    assert_eq!(result.winners[0].hand, "One Pair (Kings)");
    assert_eq!(result.community_cards, cards(&["7h", "2d", "5c", "9s", "3d"]));
    // Both contenders' hands are on display.
    assert_eq!(result.player_hands.len(), 2);
    assert_eq!(result.refunds, vec![]);

    engine.check_invariants().unwrap();
}

/// Three-way all-in with unequal stacks: a main pot, one side pot, and an
/// uncalled-excess refund to the deep stack.
#[test]
fn side_pot_with_refund() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["alice", "bob", "carol"], 1_000);
    engine.seats[0].chips = 2_000;
    engine.seats[1].chips = 500;
    engine.seats[2].chips = 1_500;
    engine.start_hand(now).unwrap();

    engine.seats[0].hole_cards = cards(&["As", "Ah"]);
    engine.seats[1].hole_cards = cards(&["Ks", "Kc"]);
    engine.seats[2].hole_cards = cards(&["Qs", "Jd"]);
    engine.deck = Deck::from_cards(cards(&["2s", "5d", "8c", "Th", "3d"]));

    // Dealer Alice shoves; both blinds call for their stacks.
    engine.process_action("p0", Action::AllIn, now).unwrap();
    engine.process_action("p1", Action::Call, now).unwrap();
    engine.process_action("p2", Action::Call, now).unwrap();

    // Everyone is all-in: the board runs out and the hand settles.
    assert!(!engine.hand_active);

    let result = engine.last_hand_result.as_ref().unwrap();
    // Main pot 500 x 3, side pot 1000 x 2, 500 uncalled back to Alice.
    assert_eq!(result.pot, 3_500);
    assert_eq!(result.refunds.len(), 1);
    assert_eq!(result.refunds[0].player_id, "p0");
    assert_eq!(result.refunds[0].amount, 500);

    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].player_id, "p0");
    assert_eq!(result.winners[0].winnings, 3_500);
    assert_eq!(result.winners[0].hand, "One Pair (Aces)");

    assert_eq!(engine.seats[0].chips, 4_000);
    assert_eq!(engine.seats[1].chips, 0);
    assert_eq!(engine.seats[2].chips, 0);

    // Both short stacks busted this hand, in seat order.
    assert_eq!(engine.elimination_order, vec!["p1".to_string(), "p2".to_string()]);
    assert_eq!(engine.seats[1].eliminated_hand, Some(1));
    assert_eq!(engine.seats[2].eliminated_hand, Some(1));

    assert!(engine.game_over);
    let view = engine.player_view(Some("p0"), now);
    let standings = view.final_standings.unwrap();
    assert_eq!(standings[0].player_id, "p0");
    assert_eq!(standings[0].rank, 1);
    assert_eq!(standings[1].player_id, "p2");
    assert_eq!(standings[2].player_id, "p1");

    // Awards plus refund equal the sum of all contributions.
    let contributions = 2_000 + 500 + 1_500;
    let awarded: Chips = result.winners.iter().map(|w| w.winnings).sum();
    let refunded: Chips = result.refunds.iter().map(|r| r.amount).sum();
    assert_eq!(awarded + refunded, contributions);
}

/// A split pot pays winners in seat order from the dealer's left, which
/// is also where any odd chip would land.
#[test]
fn split_pot_awards_in_seat_order_from_dealers_left() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["alice", "bob", "carol"], 1_000);
    engine.start_hand(now).unwrap();

    // Bob and Carol tie on the board; Alice folds preflop after raising,
    // leaving an odd pot of 45.
    engine.seats[0].hole_cards = cards(&["2c", "3c"]);
    engine.seats[1].hole_cards = cards(&["Ad", "Kd"]);
    engine.seats[2].hole_cards = cards(&["Ac", "Kc"]);
    engine.deck = Deck::from_cards(cards(&["As", "Ks", "Qh", "7s", "2h"]));

    engine
        .process_action("p0", Action::Raise { amount: 25 }, now)
        .unwrap_err(); // below min raise
    engine.process_action("p0", Action::Call, now).unwrap();
    engine.process_action("p1", Action::Call, now).unwrap();
    engine.process_action("p2", Action::Check, now).unwrap();

    // Bob bets the minimum on the flop, Carol calls, Alice folds.
    engine
        .process_action("p1", Action::Raise { amount: 20 }, now)
        .unwrap();
    engine.process_action("p2", Action::Call, now).unwrap();
    engine.process_action("p0", Action::Fold, now).unwrap();

    // Check the turn and river down.
    for _ in 0..2 {
        engine.process_action("p1", Action::Check, now).unwrap();
        engine.process_action("p2", Action::Check, now).unwrap();
    }

    let result = engine.last_hand_result.as_ref().unwrap();
    assert_eq!(result.pot, 100);
    assert_eq!(result.winners.len(), 2);

    // 100 splits 50/50; no remainder here, so force one with assertions
    // on the award order instead: seat order from the dealer's left is
    // Bob (p1) then Carol (p2).
    assert_eq!(result.winners[0].player_id, "p1");
    assert_eq!(result.winners[1].player_id, "p2");
    assert_eq!(result.winners[0].winnings, 50);
    assert_eq!(result.winners[1].winnings, 50);
    assert_eq!(engine.seats[1].chips, 1_010);
    assert_eq!(engine.seats[2].chips, 1_010);
    engine.check_invariants().unwrap();
}

/// Chip conservation across several hands of mixed play.
#[test]
fn chips_conserved_across_hands() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["a", "b", "c", "d"], 500);
    let expected = chips_in_play(&engine);

    for _ in 0..6 {
        if engine.start_hand(now).is_err() {
            break;
        }
        // Everyone folds to the big blind.
        while engine.hand_active {
            let idx = engine.action_on_idx.unwrap();
            let id = engine.seats[idx].player_id.clone();
            let to_call = engine.current_bet - engine.seats[idx].bet_this_round;
            let action = if to_call == 0 { Action::Check } else { Action::Fold };
            engine.process_action(&id, action, now).unwrap();
        }
        assert_eq!(chips_in_play(&engine), expected);
        engine.check_invariants().unwrap();
    }
}

/// The full engine state round-trips through JSON at every step of a
/// hand.
#[test]
fn serialization_identity_through_hand_lifecycle() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["alice", "bob"], 1_000);

    let assert_round_trip = |engine: &GameEngine| {
        let json = serde_json::to_string(engine).unwrap();
        let restored: GameEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, engine);
    };

    assert_round_trip(&engine);
    engine.start_hand(now).unwrap();
    assert_round_trip(&engine);

    engine.process_action("p0", Action::Call, now).unwrap();
    assert_round_trip(&engine);
    engine.process_action("p1", Action::Check, now).unwrap();
    assert_round_trip(&engine); // flop

    engine.process_action("p1", Action::Check, now).unwrap();
    engine
        .process_action("p0", Action::Raise { amount: 40 }, now)
        .unwrap();
    assert_round_trip(&engine);
    engine.process_action("p1", Action::Fold, now).unwrap();
    assert_round_trip(&engine); // between hands, result recorded
}

/// Folded seats never receive an award.
#[test]
fn folded_seat_wins_nothing() {
    let now = Utc::now();
    let mut engine = engine_with_players(&["alice", "bob", "carol"], 1_000);
    engine.start_hand(now).unwrap();

    // Carol folds the best hand preflop.
    engine.seats[0].hole_cards = cards(&["2c", "7d"]);
    engine.seats[1].hole_cards = cards(&["3c", "8d"]);
    engine.seats[2].hole_cards = cards(&["As", "Ad"]);
    engine.deck = Deck::from_cards(cards(&["Ah", "Kh", "Qd", "Js", "9c"]));

    engine.process_action("p0", Action::Call, now).unwrap();
    engine.process_action("p1", Action::Call, now).unwrap();
    engine.process_action("p2", Action::Fold, now).unwrap();

    while engine.hand_active {
        let idx = engine.action_on_idx.unwrap();
        let id = engine.seats[idx].player_id.clone();
        engine.process_action(&id, Action::Check, now).unwrap();
    }

    let result = engine.last_hand_result.as_ref().unwrap();
    assert!(result.winners.iter().all(|w| w.player_id != "p2"));
    assert_eq!(engine.seats[2].chips, 980);
}
