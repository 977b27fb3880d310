//! Blind schedule construction.
//!
//! An escalating game gets a schedule sized to a target length: a linear
//! warm-up, a geometric climb toward an average-stack big blind, and a 1.5×
//! overtime tail so the game cannot outlive its blinds. Every value is
//! snapped to the standard tournament steps.

use super::constants::BLIND_STEPS;
use super::entities::{BlindLevel, Chips};

/// Snap `value` to the nearest standard blind step. Ties snap down.
#[must_use]
pub fn snap(value: Chips) -> Chips {
    let mut best = BLIND_STEPS[0];
    let mut best_distance = best.abs_diff(value);
    for &step in &BLIND_STEPS[1..] {
        let distance = step.abs_diff(value);
        if distance < best_distance {
            best = step;
            best_distance = distance;
        }
    }
    best
}

#[must_use]
pub fn small_blind_for(big_blind: Chips) -> Chips {
    (big_blind / 2).max(1)
}

fn level(big_blind: Chips) -> BlindLevel {
    BlindLevel {
        small_blind: small_blind_for(big_blind),
        big_blind,
    }
}

/// Build the full blind schedule for a game.
///
/// With `level_duration_minutes == 0` blinds are fixed and the schedule is
/// the single initial level. Otherwise the schedule targets
/// `target_game_minutes` of play:
///
/// 1. `bb_0 = snap(starting_chips / 100)`;
/// 2. a linear phase of ⌈N/2⌉ levels stepping by `bb_0`, where
///    N = target / level duration;
/// 3. a geometric phase filling the remaining levels with ratio
///    `(starting_chips / last_bb)^(1 / (remaining − 1))`, each snapped;
/// 4. overtime at 1.5× per level until `bb >= 3 × starting_chips`.
#[must_use]
pub fn build_schedule(
    starting_chips: Chips,
    level_duration_minutes: u32,
    target_game_minutes: u32,
) -> Vec<BlindLevel> {
    let bb_initial = snap(starting_chips / 100);

    if level_duration_minutes == 0 {
        return vec![level(bb_initial)];
    }

    let total_levels = ((target_game_minutes as f64 / level_duration_minutes as f64).ceil()
        as usize)
        .max(2);
    let linear_levels = total_levels.div_ceil(2);

    let mut schedule: Vec<BlindLevel> = Vec::with_capacity(total_levels + 4);
    for i in 1..=linear_levels {
        schedule.push(level(snap(bb_initial * i as Chips)));
    }

    // Geometric climb from the end of the linear phase toward a big blind
    // of roughly the starting stack.
    let remaining = total_levels - linear_levels;
    if remaining > 0 {
        let last_bb = schedule.last().map_or(bb_initial, |l| l.big_blind);
        let ratio = if remaining > 1 {
            (starting_chips as f64 / last_bb as f64).powf(1.0 / (remaining as f64 - 1.0))
        } else {
            starting_chips as f64 / last_bb as f64
        }
        .max(1.0);

        let mut bb = last_bb as f64;
        for _ in 0..remaining {
            bb *= ratio;
            let snapped = snap(bb.round() as Chips);
            push_non_decreasing(&mut schedule, snapped);
        }
    }

    // Overtime: keep climbing at 1.5x so the blinds eventually consume any
    // surviving stack.
    let ceiling = starting_chips.saturating_mul(3);
    while schedule.last().map_or(0, |l| l.big_blind) < ceiling {
        let next = next_overtime_blind(schedule.last().map_or(bb_initial, |l| l.big_blind));
        push_non_decreasing(&mut schedule, next);
    }

    schedule
}

/// The runtime extension step: `snap(last_bb * 1.5)`, forced upward so the
/// schedule keeps growing even where the step table is sparse.
#[must_use]
pub fn next_overtime_blind(last_bb: Chips) -> Chips {
    let snapped = snap((last_bb as f64 * 1.5).round() as Chips);
    if snapped > last_bb {
        snapped
    } else {
        // Past the top of the step table, or snapped back down: step to the
        // next table entry, or grow by half again.
        BLIND_STEPS
            .iter()
            .copied()
            .find(|&s| s > last_bb)
            .unwrap_or_else(|| last_bb.saturating_add(last_bb / 2).max(last_bb + 1))
    }
}

fn push_non_decreasing(schedule: &mut Vec<BlindLevel>, big_blind: Chips) {
    let floor = schedule.last().map_or(0, |l| l.big_blind);
    let bb = big_blind.max(floor);
    if bb > floor || schedule.is_empty() {
        schedule.push(level(bb));
    } else {
        // A snapped value can repeat the previous level; force progress.
        schedule.push(level(next_overtime_blind(floor)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_exact_and_nearest() {
        assert_eq!(snap(50), 50);
        assert_eq!(snap(47), 50);
        assert_eq!(snap(44), 40);
        assert_eq!(snap(0), 1);
        assert_eq!(snap(10_000_000), 100_000);
    }

    #[test]
    fn test_snap_tie_goes_down() {
        // 45 is equidistant from 40 and 50.
        assert_eq!(snap(45), 40);
    }

    #[test]
    fn test_fixed_blind_schedule_is_single_level() {
        let schedule = build_schedule(1_000, 0, 240);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].big_blind, 10);
        assert_eq!(schedule[0].small_blind, 5);
    }

    #[test]
    fn test_linear_phase_steps_by_initial_blind() {
        // 5000 chips, 4h target, 20 min levels: 12 levels, 6 linear.
        let schedule = build_schedule(5_000, 20, 240);
        assert_eq!(schedule[0].big_blind, 50);
        for (i, expected) in [50, 100, 150, 200, 250, 300].iter().enumerate() {
            assert_eq!(schedule[i].big_blind, *expected);
        }
    }

    #[test]
    fn test_schedule_is_monotone_and_reaches_overtime_ceiling() {
        let schedule = build_schedule(5_000, 20, 240);
        for w in schedule.windows(2) {
            assert!(w[0].big_blind <= w[1].big_blind);
        }
        assert!(schedule.last().unwrap().big_blind >= 15_000);
    }

    #[test]
    fn test_small_blind_is_half_rounded_down_at_least_one() {
        let schedule = build_schedule(100, 10, 60);
        for l in &schedule {
            assert_eq!(l.small_blind, (l.big_blind / 2).max(1));
            assert!(l.small_blind >= 1);
        }
    }

    #[test]
    fn test_geometric_phase_grows_faster_than_linear() {
        let schedule = build_schedule(5_000, 20, 240);
        // The last pre-overtime steps must outpace the +50 linear step.
        let i = 6;
        assert!(schedule[i + 1].big_blind - schedule[i].big_blind > 50);
    }

    #[test]
    fn test_next_overtime_blind_always_grows() {
        let mut bb = 20;
        for _ in 0..30 {
            let next = next_overtime_blind(bb);
            assert!(next > bb);
            bb = next;
        }
    }

    #[test]
    fn test_tiny_stack_schedule() {
        let schedule = build_schedule(100, 15, 60);
        assert_eq!(schedule[0].big_blind, 1);
        assert!(schedule.last().unwrap().big_blind >= 300);
    }
}
