use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{GameId, OutcomeTally, Player, PlayerId, Position};
use crate::occurrence::OccurrenceRow;

pub const WIN_WEIGHT: f64 = 2.0;
pub const TIE_LOSS_WEIGHT: f64 = 1.0;

/// Probability of taking the win points and of the overtime-loss point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointProbs {
    pub win: f64,
    pub tie_loss: f64,
}

impl PointProbs {
    /// Unobserved states contribute zero probability mass.
    pub fn from_tally(tally: &OutcomeTally) -> Self {
        let total = tally.total();
        if total == 0 {
            return Self {
                win: 0.0,
                tie_loss: 0.0,
            };
        }
        let n = total as f64;
        Self {
            win: (tally.win + tally.tie_win) as f64 / n,
            tie_loss: tally.tie_loss as f64 / n,
        }
    }
}

/// Expected standings-point shift between the before and after tallies.
pub fn goal_reward(before: &OutcomeTally, after: &OutcomeTally) -> f64 {
    let b = PointProbs::from_tally(before);
    let a = PointProbs::from_tally(after);
    WIN_WEIGHT * (a.win - b.win) + TIE_LOSS_WEIGHT * (a.tie_loss - b.tie_loss)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRow {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub scorer_id: PlayerId,
    pub reward: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewardStats {
    pub goals_in: usize,
    pub goals_out: usize,
    pub missing_detail: usize,
    pub filtered_by_position: usize,
}

/// Build the reward table, keeping only goals whose scorer plays one of
/// `positions` when a filter is given.
pub fn apply_reward(
    occurrences: &[OccurrenceRow],
    scorers: &HashMap<(GameId, u32), PlayerId>,
    roster: &HashMap<PlayerId, Player>,
    positions: Option<&[Position]>,
) -> (Vec<RewardRow>, RewardStats) {
    let mut stats = RewardStats {
        goals_in: occurrences.len(),
        ..RewardStats::default()
    };
    let mut rows = Vec::with_capacity(occurrences.len());
    for occ in occurrences {
        let Some(&scorer_id) = scorers.get(&(occ.game_id, occ.event_number)) else {
            stats.missing_detail += 1;
            continue;
        };
        if let Some(allowed) = positions {
            let keep = roster
                .get(&scorer_id)
                .is_some_and(|p| allowed.contains(&p.position));
            if !keep {
                stats.filtered_by_position += 1;
                continue;
            }
        }
        rows.push(RewardRow {
            game_id: occ.game_id,
            event_number: occ.event_number,
            period: occ.period,
            scorer_id,
            reward: goal_reward(&occ.before, &occ.after),
        });
    }
    stats.goals_out = rows.len();
    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn worked_example() {
        let before = OutcomeTally::new(30, 10, 5, 5);
        let after = OutcomeTally::new(40, 5, 3, 2);
        assert_relative_eq!(goal_reward(&before, &after), 0.26, epsilon = 1e-12);
    }

    #[test]
    fn zero_support_is_exactly_zero() {
        let zero = OutcomeTally::default();
        assert_eq!(goal_reward(&zero, &zero), 0.0);
    }

    #[test]
    fn unobserved_side_counts_as_zero_probability() {
        let after = OutcomeTally::new(1, 0, 0, 0);
        assert_relative_eq!(goal_reward(&OutcomeTally::default(), &after), 2.0);
        assert_relative_eq!(goal_reward(&after, &OutcomeTally::default()), -2.0);
    }

    #[test]
    fn reward_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let mut draw = || {
                OutcomeTally::new(
                    rng.gen_range(0..20),
                    rng.gen_range(0..20),
                    rng.gen_range(0..20),
                    rng.gen_range(0..20),
                )
            };
            let (b, a) = (draw(), draw());
            let r = goal_reward(&b, &a);
            assert!((-3.0..=3.0).contains(&r), "reward {r} out of bounds");
        }
    }

    #[test]
    fn position_filter_uses_scorer_position() {
        let occ = |event_number| OccurrenceRow {
            game_id: 2013020001,
            event_number,
            period: 1,
            scoring_team_id: 1,
            elapsed: 100,
            before_state: Default::default(),
            after_state: None,
            before: OutcomeTally::new(1, 1, 0, 0),
            after: OutcomeTally::new(2, 0, 0, 0),
        };
        let occurrences = vec![occ(1), occ(2), occ(3)];
        let scorers = HashMap::from([((2013020001, 1), 10), ((2013020001, 2), 20)]);
        let roster = HashMap::from([
            (10, Player { player_id: 10, name: "A".into(), position: Position::C }),
            (20, Player { player_id: 20, name: "B".into(), position: Position::D }),
        ]);
        let (rows, stats) =
            apply_reward(&occurrences, &scorers, &roster, Some(&[Position::C][..]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scorer_id, 10);
        assert_relative_eq!(rows[0].reward, 1.0);
        assert_eq!(stats.missing_detail, 1);
        assert_eq!(stats.filtered_by_position, 1);
    }
}
