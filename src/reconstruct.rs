use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RinkRules;
use crate::error::{Exclusion, ExclusionReason};
use crate::model::{EnrichedEvent, EventType, GameId, GoalDetail, Outcome, RawEvent, TeamId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    pub games_in: usize,
    pub games_kept: usize,
    pub events_in: usize,
    pub events_out: usize,
    pub goals_in: usize,
    pub goals_missing_detail: usize,
    pub shootout_events_dropped: usize,
    pub games_missing_outcome: usize,
    pub games_tied: usize,
    pub games_corrupt: usize,
}

impl ReconstructStats {
    pub fn missing_goal_fraction(&self) -> f64 {
        if self.goals_in == 0 {
            0.0
        } else {
            self.goals_missing_detail as f64 / self.goals_in as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub events: Vec<EnrichedEvent>,
    pub exclusions: Vec<Exclusion>,
    pub stats: ReconstructStats,
}

/// Running score while folding over one game.
#[derive(Debug, Clone, Copy, Default)]
struct ScoreLine {
    home: u32,
    away: u32,
}

impl ScoreLine {
    fn credit(self, team: TeamId, home_team: TeamId, away_team: TeamId) -> Self {
        if team == home_team {
            Self {
                home: self.home + 1,
                ..self
            }
        } else if team == away_team {
            Self {
                away: self.away + 1,
                ..self
            }
        } else {
            self
        }
    }
}

enum GameResult {
    Kept {
        events: Vec<EnrichedEvent>,
        missing_goals: Vec<u32>,
        shootout_dropped: usize,
    },
    Excluded {
        reason: ExclusionReason,
        missing_goals: Vec<u32>,
    },
}

/// Enrich every event with score, manpower, elapsed time and the game outcome.
///
/// Games are folded independently in game-id order. A goal row carries the
/// score before that goal; every later row includes it. Outcomes use the final
/// score (shootout goals included) and the period of the last period-end or
/// game-end marker, after which shootout-period rows are removed.
pub fn reconstruct(
    events: Vec<RawEvent>,
    goals: &[GoalDetail],
    rules: &RinkRules,
) -> Reconstruction {
    let goal_index: HashMap<(GameId, u32), &GoalDetail> = goals
        .iter()
        .map(|g| ((g.game_id, g.event_number), g))
        .collect();

    let mut stats = ReconstructStats {
        events_in: events.len(),
        ..ReconstructStats::default()
    };

    let mut by_game: BTreeMap<GameId, Vec<RawEvent>> = BTreeMap::new();
    for event in events {
        by_game.entry(event.game_id).or_default().push(event);
    }
    stats.games_in = by_game.len();

    let mut out = Vec::new();
    let mut exclusions = Vec::new();

    for (game_id, mut game_events) in by_game {
        game_events.sort_by_key(|e| e.event_number);
        stats.goals_in += game_events
            .iter()
            .filter(|e| e.event_type.is_goal())
            .count();

        match reconstruct_game(game_id, game_events, &goal_index, rules) {
            GameResult::Kept {
                events,
                missing_goals,
                shootout_dropped,
            } => {
                note_missing_goals(game_id, &missing_goals, &mut exclusions);
                stats.goals_missing_detail += missing_goals.len();
                stats.shootout_events_dropped += shootout_dropped;
                stats.games_kept += 1;
                stats.events_out += events.len();
                out.extend(events);
            }
            GameResult::Excluded {
                reason,
                missing_goals,
            } => {
                note_missing_goals(game_id, &missing_goals, &mut exclusions);
                stats.goals_missing_detail += missing_goals.len();
                match reason {
                    ExclusionReason::MissingOutcome => stats.games_missing_outcome += 1,
                    ExclusionReason::TiedFinalScore => stats.games_tied += 1,
                    ExclusionReason::CorruptOvertime => stats.games_corrupt += 1,
                    ExclusionReason::MissingGoalDetail => {}
                }
                warn!(game_id, reason = %reason, "excluding game");
                exclusions.push(Exclusion {
                    game_id,
                    event_number: None,
                    reason,
                });
            }
        }
    }

    debug!(
        games_in = stats.games_in,
        games_kept = stats.games_kept,
        events_out = stats.events_out,
        "reconstruction finished"
    );

    Reconstruction {
        events: out,
        exclusions,
        stats,
    }
}

fn note_missing_goals(game_id: GameId, missing: &[u32], exclusions: &mut Vec<Exclusion>) {
    for event_number in missing {
        warn!(game_id, event_number, "goal has no goal record");
        exclusions.push(Exclusion {
            game_id,
            event_number: Some(*event_number),
            reason: ExclusionReason::MissingGoalDetail,
        });
    }
}

fn reconstruct_game(
    game_id: GameId,
    events: Vec<RawEvent>,
    goal_index: &HashMap<(GameId, u32), &GoalDetail>,
    rules: &RinkRules,
) -> GameResult {
    let mut missing_goals = Vec::new();
    let mut score = ScoreLine::default();
    let mut rows: Vec<(RawEvent, ScoreLine, Option<TeamId>)> = Vec::with_capacity(events.len());
    let mut terminal_period: Option<u8> = None;
    let mut has_game_end = false;
    let mut latest_goal_period = 0u8;

    for event in events {
        let mut scoring_team = None;
        if event.event_type.is_goal() {
            latest_goal_period = latest_goal_period.max(event.period);
            match goal_index.get(&(event.game_id, event.event_number)) {
                Some(detail)
                    if detail.scoring_team_id == event.home_team_id
                        || detail.scoring_team_id == event.away_team_id =>
                {
                    scoring_team = Some(detail.scoring_team_id);
                }
                _ => missing_goals.push(event.event_number),
            }
        }
        if event.event_type.is_terminal_marker() {
            terminal_period = Some(event.period);
        }
        if event.event_type == EventType::GameEnd {
            has_game_end = true;
        }

        // the goal row keeps the pre-goal score; the increment shows from the next row on
        let row_score = score;
        if let Some(team) = scoring_team {
            score = score.credit(team, event.home_team_id, event.away_team_id);
        }
        rows.push((event, row_score, scoring_team));
    }

    let Some(terminal_period) = terminal_period.filter(|_| has_game_end) else {
        return GameResult::Excluded {
            reason: ExclusionReason::MissingOutcome,
            missing_goals,
        };
    };

    let shootout = rules.shootout_period_for(game_id);
    let regulation_end = rules.is_regulation(terminal_period);
    if regulation_end && !rules.is_regulation(latest_goal_period) {
        return GameResult::Excluded {
            reason: ExclusionReason::CorruptOvertime,
            missing_goals,
        };
    }

    let outcome = if score.home > score.away {
        if regulation_end {
            Outcome::Win
        } else {
            Outcome::TieWin
        }
    } else if score.home < score.away {
        if regulation_end {
            Outcome::Loss
        } else {
            Outcome::TieLoss
        }
    } else {
        return GameResult::Excluded {
            reason: ExclusionReason::TiedFinalScore,
            missing_goals,
        };
    };

    let mut shootout_dropped = 0usize;
    let mut enriched = Vec::with_capacity(rows.len());
    for (event, row_score, scoring_team) in rows {
        if shootout.is_some_and(|p| event.period == p) {
            shootout_dropped += 1;
            continue;
        }
        enriched.push(EnrichedEvent {
            game_id: event.game_id,
            event_number: event.event_number,
            period: event.period,
            clock_seconds: event.clock_seconds,
            elapsed: rules.elapsed_seconds(event.period, event.clock_seconds),
            event_type: event.event_type,
            home_team_id: event.home_team_id,
            away_team_id: event.away_team_id,
            external_event_id: event.external_event_id,
            scoring_team_id: scoring_team,
            home_goals: row_score.home,
            away_goals: row_score.away,
            home_on_ice: event.home_on_ice,
            away_on_ice: event.away_on_ice,
            outcome,
            game_date: event.game_date,
        });
    }

    GameResult::Kept {
        events: enriched,
        missing_goals,
        shootout_dropped,
    }
}

/// Parse an in-period clock such as `12:34` or `00:12:34` into seconds.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let nums: Option<Vec<u32>> = parts.iter().map(|p| p.trim().parse::<u32>().ok()).collect();
    let nums = nums?;
    match nums.as_slice() {
        [s] => Some(*s),
        [m, s] if *s < 60 => Some(m * 60 + s),
        [h, m, s] if *m < 60 && *s < 60 => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}
