use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::{
    EnrichedEvent, GameId, GameState, Outcome, OutcomeTally, Side, TeamId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub elapsed: u32,
    pub state: GameState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSnapshot {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub scoring_team_id: TeamId,
    pub scoring_side: Side,
    /// The goal row itself, which carries the pre-goal score.
    pub before: Snapshot,
    pub after: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceRow {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub scoring_team_id: TeamId,
    pub elapsed: u32,
    pub before_state: GameState,
    pub after_state: Option<GameState>,
    pub before: OutcomeTally,
    pub after: OutcomeTally,
}

/// Goals without a scoring team are skipped.
pub fn goal_snapshots(events: &[EnrichedEvent]) -> Vec<GoalSnapshot> {
    let mut by_game: BTreeMap<GameId, Vec<&EnrichedEvent>> = BTreeMap::new();
    for event in events {
        by_game.entry(event.game_id).or_default().push(event);
    }

    let mut out = Vec::new();
    for (_, mut rows) in by_game {
        rows.sort_by_key(|e| e.event_number);
        for (pos, row) in rows.iter().enumerate() {
            if !row.event_type.is_goal() {
                continue;
            }
            let (Some(team), Some(side)) = (row.scoring_team_id, row.scoring_side()) else {
                continue;
            };
            let after = rows.get(pos + 1).map(|next| Snapshot {
                elapsed: next.elapsed,
                state: next.state(Side::Home),
            });
            out.push(GoalSnapshot {
                game_id: row.game_id,
                event_number: row.event_number,
                period: row.period,
                scoring_team_id: team,
                scoring_side: side,
                before: Snapshot {
                    elapsed: row.elapsed,
                    state: row.state(Side::Home),
                },
                after,
            });
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct TrackRow {
    elapsed: u32,
    is_goal: bool,
    home_state: GameState,
    home_outcome: Outcome,
}

#[derive(Debug, Clone)]
struct GameTrack {
    rows: Vec<TrackRow>,
    monotone: bool,
}

impl GameTrack {
    /// Last row (in event order) with `0 < elapsed < cutoff`.
    fn last_before(&self, cutoff: u32) -> Option<&TrackRow> {
        if self.monotone {
            let end = self.rows.partition_point(|r| r.elapsed < cutoff);
            let row = self.rows[..end].last()?;
            (row.elapsed > 0).then_some(row)
        } else {
            self.rows
                .iter()
                .rev()
                .find(|r| r.elapsed > 0 && r.elapsed < cutoff)
        }
    }

    /// First non-goal row (in event order) with `elapsed >= cutoff`.
    fn first_after(&self, cutoff: u32) -> Option<&TrackRow> {
        if self.monotone {
            let start = self.rows.partition_point(|r| r.elapsed < cutoff);
            self.rows[start..].iter().find(|r| !r.is_goal)
        } else {
            self.rows
                .iter()
                .find(|r| !r.is_goal && r.elapsed >= cutoff)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OccurrenceIndex {
    games: Vec<GameTrack>,
}

impl OccurrenceIndex {
    pub fn build(events: &[EnrichedEvent]) -> Self {
        let mut by_game: BTreeMap<GameId, Vec<&EnrichedEvent>> = BTreeMap::new();
        for event in events {
            by_game.entry(event.game_id).or_default().push(event);
        }
        let games = by_game
            .into_values()
            .map(|mut rows| {
                rows.sort_by_key(|e| e.event_number);
                let rows: Vec<TrackRow> = rows
                    .into_iter()
                    .map(|e| TrackRow {
                        elapsed: e.elapsed,
                        is_goal: e.event_type.is_goal(),
                        home_state: e.state(Side::Home),
                        home_outcome: e.outcome,
                    })
                    .collect();
                let monotone = rows.windows(2).all(|w| w[0].elapsed <= w[1].elapsed);
                GameTrack { rows, monotone }
            })
            .collect();
        Self { games }
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn count_before(&self, elapsed: u32, state: GameState) -> OutcomeTally {
        let mut tally = OutcomeTally::default();
        for game in &self.games {
            if let Some(row) = game.last_before(elapsed) {
                tally_row(&mut tally, row, state);
            }
        }
        tally
    }

    pub fn count_after(&self, elapsed: u32, state: GameState) -> OutcomeTally {
        let mut tally = OutcomeTally::default();
        for game in &self.games {
            if let Some(row) = game.first_after(elapsed) {
                tally_row(&mut tally, row, state);
            }
        }
        tally
    }
}

// A row is an observation for both teams: the home team at its state and the
// away team at the flipped state.
fn tally_row(tally: &mut OutcomeTally, row: &TrackRow, state: GameState) {
    if row.home_state == state {
        tally.record(row.home_outcome);
    }
    if row.home_state.flip() == state {
        tally.record(row.home_outcome.flip());
    }
}

/// Output order follows `goals`.
pub fn count_occurrences(goals: &[GoalSnapshot], index: &OccurrenceIndex) -> Vec<OccurrenceRow> {
    goals
        .par_iter()
        .map(|goal| count_goal(goal, index))
        .collect()
}

pub fn count_goal(goal: &GoalSnapshot, index: &OccurrenceIndex) -> OccurrenceRow {
    let before = index
        .count_before(goal.before.elapsed, goal.before.state)
        .for_side(goal.scoring_side);
    let after = goal
        .after
        .map(|snap| index.count_after(snap.elapsed, snap.state).for_side(goal.scoring_side))
        .unwrap_or_default();
    let perspective = |state: GameState| match goal.scoring_side {
        Side::Home => state,
        Side::Away => state.flip(),
    };
    OccurrenceRow {
        game_id: goal.game_id,
        event_number: goal.event_number,
        period: goal.period,
        scoring_team_id: goal.scoring_team_id,
        elapsed: goal.before.elapsed,
        before_state: perspective(goal.before.state),
        after_state: goal.after.map(|snap| perspective(snap.state)),
        before,
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(elapsed: u32, is_goal: bool, gd: i32, outcome: Outcome) -> TrackRow {
        TrackRow {
            elapsed,
            is_goal,
            home_state: GameState::new(gd, 0),
            home_outcome: outcome,
        }
    }

    #[test]
    fn before_lookup_skips_time_zero_and_cutoff() {
        let track = GameTrack {
            rows: vec![
                row(0, false, 0, Outcome::Win),
                row(10, false, 0, Outcome::Win),
                row(20, false, 1, Outcome::Win),
            ],
            monotone: true,
        };
        assert_eq!(track.last_before(20).map(|r| r.elapsed), Some(10));
        assert!(track.last_before(5).is_none());
        assert!(track.last_before(0).is_none());
    }

    #[test]
    fn after_lookup_skips_goal_rows() {
        let track = GameTrack {
            rows: vec![
                row(10, false, 0, Outcome::Win),
                row(20, true, 0, Outcome::Win),
                row(20, false, 1, Outcome::Win),
            ],
            monotone: true,
        };
        let hit = track.first_after(20).map(|r| r.home_state.goal_diff);
        assert_eq!(hit, Some(1));
    }

    #[test]
    fn linear_fallback_matches_binary_search() {
        let rows = vec![
            row(5, false, 0, Outcome::Loss),
            row(30, false, 0, Outcome::Loss),
            row(25, false, -1, Outcome::Loss),
            row(40, true, -1, Outcome::Loss),
            row(41, false, 0, Outcome::Loss),
        ];
        let track = GameTrack {
            rows,
            monotone: false,
        };
        assert_eq!(track.last_before(28).map(|r| r.elapsed), Some(25));
        assert_eq!(track.first_after(31).map(|r| r.elapsed), Some(41));
    }

    #[test]
    fn level_state_counts_both_perspectives() {
        let mut tally = OutcomeTally::default();
        tally_row(&mut tally, &row(10, false, 0, Outcome::TieWin), GameState::default());
        assert_eq!(tally, OutcomeTally::new(0, 0, 1, 1));

        let mut tally = OutcomeTally::default();
        tally_row(&mut tally, &row(10, false, -1, Outcome::Win), GameState::new(1, 0));
        assert_eq!(tally, OutcomeTally::new(0, 1, 0, 0));
    }
}
