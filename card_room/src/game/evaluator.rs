//! Hand evaluation: rank the best 5-card hand out of up to 7 cards.
//!
//! `HandRank` values order exactly like poker hands, so winners fall out of
//! `Ord`. The wheel (A-2-3-4-5) counts as a 5-high straight.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::entities::{Card, Rank, RANK_ACE};

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "High Card",
            Self::OnePair => "One Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        };
        write!(f, "{repr}")
    }
}

/// A totally ordered hand ranking: category first, then tiebreak ranks in
/// descending significance.
#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandRank {
    pub category: HandCategory,
    pub tiebreakers: Vec<Rank>,
}

impl HandRank {
    #[must_use]
    pub fn name(&self) -> String {
        self.category.to_string()
    }

    /// Human-readable description, e.g. "One Pair (Kings)" or
    /// "Full House (Sevens over Kings)".
    #[must_use]
    pub fn describe(&self) -> String {
        let first = self.tiebreakers.first().copied().unwrap_or(0);
        let second = self.tiebreakers.get(1).copied().unwrap_or(0);
        match self.category {
            HandCategory::HighCard => format!("High Card ({})", rank_name(first)),
            HandCategory::OnePair => format!("One Pair ({})", rank_name_plural(first)),
            HandCategory::TwoPair => format!(
                "Two Pair ({} and {})",
                rank_name_plural(first),
                rank_name_plural(second)
            ),
            HandCategory::ThreeOfAKind => {
                format!("Three of a Kind ({})", rank_name_plural(first))
            }
            HandCategory::Straight => format!("Straight ({} High)", rank_name(first)),
            HandCategory::Flush => format!("Flush ({} High)", rank_name(first)),
            HandCategory::FullHouse => format!(
                "Full House ({} over {})",
                rank_name_plural(first),
                rank_name_plural(second)
            ),
            HandCategory::FourOfAKind => {
                format!("Four of a Kind ({})", rank_name_plural(first))
            }
            HandCategory::StraightFlush => {
                format!("Straight Flush ({} High)", rank_name(first))
            }
            HandCategory::RoyalFlush => "Royal Flush".to_string(),
        }
    }
}

fn rank_name(rank: Rank) -> &'static str {
    match rank {
        2 => "Two",
        3 => "Three",
        4 => "Four",
        5 => "Five",
        6 => "Six",
        7 => "Seven",
        8 => "Eight",
        9 => "Nine",
        10 => "Ten",
        11 => "Jack",
        12 => "Queen",
        13 => "King",
        14 => "Ace",
        _ => "Unknown",
    }
}

fn rank_name_plural(rank: Rank) -> String {
    let name = rank_name(rank);
    if rank == 6 {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.category)
    }
}

/// Evaluate exactly five cards.
fn evaluate_five(cards: &[Card]) -> HandRank {
    debug_assert_eq!(cards.len(), 5);

    let mut ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);

    let mut counts: HashMap<Rank, u8> = HashMap::with_capacity(5);
    for &r in &ranks {
        *counts.entry(r).or_default() += 1;
    }

    // Straight detection, including the wheel.
    let mut unique: Vec<Rank> = ranks.clone();
    unique.dedup();
    let (is_straight, straight_high) = if unique.len() == 5 {
        if unique[0] - unique[4] == 4 {
            (true, unique[0])
        } else if unique == [14, 5, 4, 3, 2] {
            // Wheel: the ace plays low, so the hand is 5-high.
            (true, 5)
        } else {
            (false, 0)
        }
    } else {
        (false, 0)
    };

    if is_straight && is_flush {
        if straight_high == RANK_ACE {
            return HandRank {
                category: HandCategory::RoyalFlush,
                tiebreakers: vec![RANK_ACE],
            };
        }
        return HandRank {
            category: HandCategory::StraightFlush,
            tiebreakers: vec![straight_high],
        };
    }

    // Rank groups sorted by (count desc, rank desc).
    let mut groups: Vec<(Rank, u8)> = counts.into_iter().collect();
    groups.sort_unstable_by(|a, b| (b.1, b.0).cmp(&(a.1, a.0)));

    match (groups[0].1, groups.get(1).map_or(0, |g| g.1)) {
        (4, _) => HandRank {
            category: HandCategory::FourOfAKind,
            tiebreakers: vec![groups[0].0, groups[1].0],
        },
        (3, 2) => HandRank {
            category: HandCategory::FullHouse,
            tiebreakers: vec![groups[0].0, groups[1].0],
        },
        _ if is_flush => HandRank {
            category: HandCategory::Flush,
            tiebreakers: ranks,
        },
        _ if is_straight => HandRank {
            category: HandCategory::Straight,
            tiebreakers: vec![straight_high],
        },
        (3, _) => {
            let mut tiebreakers = vec![groups[0].0];
            tiebreakers.extend(groups[1..].iter().map(|g| g.0));
            HandRank {
                category: HandCategory::ThreeOfAKind,
                tiebreakers,
            }
        }
        (2, 2) => HandRank {
            category: HandCategory::TwoPair,
            tiebreakers: vec![groups[0].0, groups[1].0, groups[2].0],
        },
        (2, _) => {
            let mut tiebreakers = vec![groups[0].0];
            tiebreakers.extend(groups[1..].iter().map(|g| g.0));
            HandRank {
                category: HandCategory::OnePair,
                tiebreakers,
            }
        }
        _ => HandRank {
            category: HandCategory::HighCard,
            tiebreakers: ranks,
        },
    }
}

/// Evaluate the best 5-card hand from any 5 or more cards.
///
/// Returns `None` when fewer than five cards are supplied.
#[must_use]
pub fn evaluate(cards: &[Card]) -> Option<HandRank> {
    let n = cards.len();
    if n < 5 {
        return None;
    }
    if n == 5 {
        return Some(evaluate_five(cards));
    }

    let mut best: Option<HandRank> = None;
    for a in 0..n - 4 {
        for b in a + 1..n - 3 {
            for c in b + 1..n - 2 {
                for d in c + 1..n - 1 {
                    for e in d + 1..n {
                        let five = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        let rank = evaluate_five(&five);
                        if best.as_ref().map_or(true, |x| rank > *x) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }
    best
}

/// Given each contender's hand, return the ids whose rank ties for best.
#[must_use]
pub fn determine_winners(player_hands: &HashMap<String, HandRank>) -> Vec<String> {
    let Some(best) = player_hands.values().max() else {
        return Vec::new();
    };
    player_hands
        .iter()
        .filter(|(_, rank)| *rank == best)
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(reprs: &[&str]) -> Vec<Card> {
        reprs
            .iter()
            .map(|r| Card::from_str_repr(r).expect("valid card repr"))
            .collect()
    }

    fn rank_of(reprs: &[&str]) -> HandRank {
        evaluate(&cards(reprs)).expect("enough cards")
    }

    #[test]
    fn test_high_card() {
        let rank = rank_of(&["Ah", "Kd", "9c", "5s", "2h"]);
        assert_eq!(rank.category, HandCategory::HighCard);
        assert_eq!(rank.tiebreakers, vec![14, 13, 9, 5, 2]);
    }

    #[test]
    fn test_one_pair_with_kickers() {
        let rank = rank_of(&["Kh", "Kd", "9c", "5s", "2h"]);
        assert_eq!(rank.category, HandCategory::OnePair);
        assert_eq!(rank.tiebreakers, vec![13, 9, 5, 2]);
    }

    #[test]
    fn test_two_pair() {
        let rank = rank_of(&["Kh", "Kd", "9c", "9s", "2h"]);
        assert_eq!(rank.category, HandCategory::TwoPair);
        assert_eq!(rank.tiebreakers, vec![13, 9, 2]);
    }

    #[test]
    fn test_three_of_a_kind() {
        let rank = rank_of(&["7h", "7d", "7c", "Ks", "2h"]);
        assert_eq!(rank.category, HandCategory::ThreeOfAKind);
        assert_eq!(rank.tiebreakers, vec![7, 13, 2]);
    }

    #[test]
    fn test_straight() {
        let rank = rank_of(&["9h", "8d", "7c", "6s", "5h"]);
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(rank.tiebreakers, vec![9]);
    }

    #[test]
    fn test_wheel_is_five_high_straight() {
        let wheel = rank_of(&["Ah", "2d", "3c", "4s", "5h"]);
        assert_eq!(wheel.category, HandCategory::Straight);
        assert_eq!(wheel.tiebreakers, vec![5]);

        let six_high = rank_of(&["2h", "3d", "4c", "5s", "6h"]);
        assert!(wheel < six_high);
    }

    #[test]
    fn test_flush() {
        let rank = rank_of(&["Ah", "Jh", "9h", "5h", "2h"]);
        assert_eq!(rank.category, HandCategory::Flush);
        assert_eq!(rank.tiebreakers, vec![14, 11, 9, 5, 2]);
    }

    #[test]
    fn test_full_house() {
        let rank = rank_of(&["7h", "7d", "7c", "Ks", "Kh"]);
        assert_eq!(rank.category, HandCategory::FullHouse);
        assert_eq!(rank.tiebreakers, vec![7, 13]);
    }

    #[test]
    fn test_four_of_a_kind() {
        let rank = rank_of(&["7h", "7d", "7c", "7s", "Kh"]);
        assert_eq!(rank.category, HandCategory::FourOfAKind);
        assert_eq!(rank.tiebreakers, vec![7, 13]);
    }

    #[test]
    fn test_straight_flush_and_royal() {
        let sf = rank_of(&["9h", "8h", "7h", "6h", "5h"]);
        assert_eq!(sf.category, HandCategory::StraightFlush);
        assert_eq!(sf.tiebreakers, vec![9]);

        let royal = rank_of(&["Ah", "Kh", "Qh", "Jh", "Th"]);
        assert_eq!(royal.category, HandCategory::RoyalFlush);
        assert!(royal > sf);
    }

    #[test]
    fn test_steel_wheel_is_straight_flush_not_royal() {
        let rank = rank_of(&["Ah", "2h", "3h", "4h", "5h"]);
        assert_eq!(rank.category, HandCategory::StraightFlush);
        assert_eq!(rank.tiebreakers, vec![5]);
    }

    #[test]
    fn test_best_of_seven() {
        // Board pairs the hole cards into a set over a board flush draw.
        let rank = rank_of(&["Ah", "Ad", "Ac", "Ks", "Kh", "2d", "3c"]);
        assert_eq!(rank.category, HandCategory::FullHouse);
        assert_eq!(rank.tiebreakers, vec![14, 13]);
    }

    #[test]
    fn test_best_of_six() {
        let rank = rank_of(&["9h", "8d", "7c", "6s", "5h", "Ah"]);
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(rank.tiebreakers, vec![9]);
    }

    #[test]
    fn test_too_few_cards() {
        assert!(evaluate(&cards(&["Ah", "Kd"])).is_none());
    }

    #[test]
    fn test_permutation_invariance() {
        let base = cards(&["Ks", "Kc", "7h", "2d", "5c", "9s", "3d"]);
        let expected = evaluate(&base).unwrap();

        // A handful of rotations and swaps must all agree.
        let mut permuted = base.clone();
        for i in 0..base.len() {
            permuted.rotate_left(1);
            assert_eq!(evaluate(&permuted).unwrap(), expected);
            let j = (i * 3 + 1) % base.len();
            permuted.swap(0, j);
            assert_eq!(evaluate(&permuted).unwrap(), expected);
        }
    }

    #[test]
    fn test_determine_winners_single() {
        let mut hands = HashMap::new();
        hands.insert("a".to_string(), rank_of(&["Kh", "Kd", "9c", "5s", "2h"]));
        hands.insert("b".to_string(), rank_of(&["Qh", "Qd", "9c", "5s", "2h"]));
        assert_eq!(determine_winners(&hands), vec!["a".to_string()]);
    }

    #[test]
    fn test_determine_winners_tie() {
        let mut hands = HashMap::new();
        hands.insert("a".to_string(), rank_of(&["Kh", "Kd", "9c", "5s", "2h"]));
        hands.insert("b".to_string(), rank_of(&["Ks", "Kc", "9d", "5h", "2c"]));
        let mut winners = determine_winners(&hands);
        winners.sort();
        assert_eq!(winners, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_determine_winners_empty() {
        assert!(determine_winners(&HashMap::new()).is_empty());
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            rank_of(&["Kh", "Kd", "9c", "5s", "2h"]).describe(),
            "One Pair (Kings)"
        );
        assert_eq!(
            rank_of(&["Kh", "Kd", "9c", "9s", "2h"]).describe(),
            "Two Pair (Kings and Nines)"
        );
        assert_eq!(
            rank_of(&["6h", "6d", "6c", "Ks", "Kh"]).describe(),
            "Full House (Sixes over Kings)"
        );
        assert_eq!(
            rank_of(&["9h", "8d", "7c", "6s", "5h"]).describe(),
            "Straight (Nine High)"
        );
        assert_eq!(
            rank_of(&["Ah", "Kh", "Qh", "Jh", "Th"]).describe(),
            "Royal Flush"
        );
    }
}
