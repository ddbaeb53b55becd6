use anyhow::Result;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::model::{
    EventType, GAME_TYPE_PLAYOFFS, GAME_TYPE_REGULAR, GameId, GoalDetail, Player, PlayerId,
    Position, RawEvent, Side, TeamId,
};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub season: i32,
    pub games: usize,
    pub teams: u32,
    pub playoffs: bool,
    pub start_date: NaiveDate,
    pub games_per_day: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            season: 2013,
            games: 40,
            teams: 8,
            playoffs: false,
            start_date: NaiveDate::from_ymd_opt(2013, 10, 1).unwrap_or_default(),
            games_per_day: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticCorpus {
    pub events: Vec<RawEvent>,
    pub goals: Vec<GoalDetail>,
    pub players: Vec<Player>,
    pub dates: Vec<(GameId, NaiveDate)>,
}

impl SyntheticCorpus {
    pub fn load_into(&self, store: &mut Store) -> Result<()> {
        store.insert_players(&self.players)?;
        store.insert_game_dates(&self.dates)?;
        store.insert_events(&self.events)?;
        store.insert_goals(&self.goals)?;
        Ok(())
    }
}

const PERIOD_SECONDS: u32 = 1200;
const REGULAR_OT_SECONDS: u32 = 300;
const PENALTY_SECONDS: u32 = 120;

struct Roster {
    forwards: Vec<PlayerId>,
    defense: Vec<PlayerId>,
    goalie: PlayerId,
}

fn team_roster(team: TeamId, players: &mut Vec<Player>) -> Roster {
    let base = team * 100;
    let mut forwards = Vec::new();
    let mut defense = Vec::new();
    let forward_positions = [Position::C, Position::L, Position::R];
    for k in 0..12u32 {
        let id = base + k + 1;
        forwards.push(id);
        players.push(Player {
            player_id: id,
            name: format!("Team{team} F{}", k + 1),
            position: forward_positions[(k % 3) as usize],
        });
    }
    for k in 0..6u32 {
        let id = base + 20 + k + 1;
        defense.push(id);
        players.push(Player {
            player_id: id,
            name: format!("Team{team} D{}", k + 1),
            position: Position::D,
        });
    }
    let goalie = base + 31;
    players.push(Player {
        player_id: goalie,
        name: format!("Team{team} G1"),
        position: Position::G,
    });
    Roster {
        forwards,
        defense,
        goalie,
    }
}

/// Goalie plus up to five skaters, fewer while shorthanded.
fn on_ice(roster: &Roster, skaters: usize, rng: &mut StdRng) -> Vec<PlayerId> {
    let defense_count = 2.min(skaters);
    let forward_count = skaters - defense_count;
    let mut out: Vec<PlayerId> = roster
        .forwards
        .choose_multiple(rng, forward_count)
        .copied()
        .collect();
    out.extend(roster.defense.choose_multiple(rng, defense_count).copied());
    out.push(roster.goalie);
    out
}

struct GameBuilder<'a> {
    game_id: GameId,
    home: TeamId,
    away: TeamId,
    home_roster: &'a Roster,
    away_roster: &'a Roster,
    date: NaiveDate,
    next_event: u32,
    penalties: Vec<(Side, u32)>,
    score: (u32, u32),
    events: Vec<RawEvent>,
    goals: Vec<GoalDetail>,
}

impl GameBuilder<'_> {
    fn skaters(&self, side: Side, elapsed: u32) -> usize {
        let boxed = self
            .penalties
            .iter()
            .filter(|(s, until)| *s == side && *until > elapsed)
            .count();
        5usize.saturating_sub(boxed).max(3)
    }

    fn push(
        &mut self,
        period: u8,
        clock: u32,
        event_type: EventType,
        rng: &mut StdRng,
    ) -> (Vec<PlayerId>, Vec<PlayerId>) {
        let elapsed = PERIOD_SECONDS * u32::from(period - 1) + clock;
        let home_on_ice = on_ice(self.home_roster, self.skaters(Side::Home, elapsed), rng);
        let away_on_ice = on_ice(self.away_roster, self.skaters(Side::Away, elapsed), rng);
        self.next_event += 1;
        self.events.push(RawEvent {
            game_id: self.game_id,
            event_number: self.next_event,
            period,
            clock_seconds: clock,
            event_type,
            home_team_id: self.home,
            away_team_id: self.away,
            external_event_id: None,
            home_on_ice: home_on_ice.clone(),
            away_on_ice: away_on_ice.clone(),
            game_date: Some(self.date),
        });
        (home_on_ice, away_on_ice)
    }

    fn goal(&mut self, period: u8, clock: u32, side: Side, rng: &mut StdRng) {
        let (home_ice, away_ice) = self.push(period, clock, EventType::Goal, rng);
        let (team, ice, goalie) = match side {
            Side::Home => (self.home, home_ice, self.home_roster.goalie),
            Side::Away => (self.away, away_ice, self.away_roster.goalie),
        };
        let mut shooters: Vec<PlayerId> = ice.into_iter().filter(|id| *id != goalie).collect();
        shooters.shuffle(rng);
        let assists = rng.gen_range(0..=2usize).min(shooters.len().saturating_sub(1));
        self.goals.push(GoalDetail {
            game_id: self.game_id,
            event_number: self.next_event,
            goal_id: Some(u64::from(self.next_event)),
            scoring_team_id: team,
            scorer_id: shooters[0],
            first_assist_id: (assists >= 1).then(|| shooters[1]),
            second_assist_id: (assists >= 2).then(|| shooters[2]),
        });
        match side {
            Side::Home => self.score.0 += 1,
            Side::Away => self.score.1 += 1,
        }
        // a power-play goal releases one penalized opponent
        let elapsed = PERIOD_SECONDS * u32::from(period - 1) + clock;
        if let Some(pos) = self
            .penalties
            .iter()
            .position(|(s, until)| *s == side.flip() && *until > elapsed)
        {
            self.penalties.remove(pos);
        }
    }

    /// Play one period up to `length` seconds. Returns true when a sudden-death
    /// goal ended the game.
    fn play_period(&mut self, period: u8, length: u32, sudden_death: bool, rng: &mut StdRng) -> bool {
        self.push(period, 0, EventType::PeriodStart, rng);
        self.push(period, 0, EventType::Faceoff, rng);
        let mut clock = 0u32;
        loop {
            clock += rng.gen_range(15..60);
            if clock >= length {
                break;
            }
            let elapsed = PERIOD_SECONDS * u32::from(period - 1) + clock;
            let roll: f64 = rng.gen_range(0.0..1.0);
            if roll < 0.05 {
                let home_edge =
                    self.skaters(Side::Home, elapsed) as f64 - self.skaters(Side::Away, elapsed) as f64;
                let side = if rng.gen_bool((0.5 + 0.15 * home_edge).clamp(0.1, 0.9)) {
                    Side::Home
                } else {
                    Side::Away
                };
                self.goal(period, clock, side, rng);
                if sudden_death {
                    return true;
                }
                self.push(period, clock, EventType::Faceoff, rng);
            } else if roll < 0.12 {
                let side = if rng.gen_bool(0.5) { Side::Home } else { Side::Away };
                self.push(period, clock, EventType::Penalty, rng);
                self.penalties.push((side, elapsed + PENALTY_SECONDS));
            } else if roll < 0.55 {
                self.push(period, clock, EventType::Shot, rng);
            } else {
                self.push(period, clock, EventType::Faceoff, rng);
            }
        }
        self.push(period, length, EventType::PeriodEnd, rng);
        false
    }

    fn finish(&mut self, period: u8, clock: u32, rng: &mut StdRng) {
        self.push(period, clock, EventType::GameEnd, rng);
    }
}

/// Seeded corpus of complete, well-formed games.
pub fn generate(cfg: &SyntheticConfig) -> SyntheticCorpus {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut players = Vec::new();
    let teams = cfg.teams.max(2);
    let rosters: Vec<Roster> = (1..=teams).map(|t| team_roster(t, &mut players)).collect();
    let game_type = if cfg.playoffs {
        GAME_TYPE_PLAYOFFS
    } else {
        GAME_TYPE_REGULAR
    };
    let per_day = cfg.games_per_day.max(1);

    let mut corpus = SyntheticCorpus {
        players,
        ..SyntheticCorpus::default()
    };

    for n in 0..cfg.games {
        let game_id = cfg.season.max(0) as u64 * 1_000_000 + u64::from(game_type) * 10_000 + n as u64 + 1;
        let home_idx = rng.gen_range(0..teams as usize);
        let mut away_idx = rng.gen_range(0..teams as usize - 1);
        if away_idx >= home_idx {
            away_idx += 1;
        }
        let date = cfg
            .start_date
            .checked_add_days(Days::new((n / per_day) as u64))
            .unwrap_or(cfg.start_date);
        let mut game = GameBuilder {
            game_id,
            home: home_idx as TeamId + 1,
            away: away_idx as TeamId + 1,
            home_roster: &rosters[home_idx],
            away_roster: &rosters[away_idx],
            date,
            next_event: 0,
            penalties: Vec::new(),
            score: (0, 0),
            events: Vec::new(),
            goals: Vec::new(),
        };

        for period in 1..=3u8 {
            game.play_period(period, PERIOD_SECONDS, false, &mut rng);
        }
        let mut last_period = 3u8;
        if game.score.0 == game.score.1 {
            if cfg.playoffs {
                let mut period = 4u8;
                loop {
                    if game.play_period(period, PERIOD_SECONDS, true, &mut rng) {
                        break;
                    }
                    if period >= 8 {
                        let side = if rng.gen_bool(0.5) { Side::Home } else { Side::Away };
                        game.goal(period, PERIOD_SECONDS, side, &mut rng);
                        break;
                    }
                    period += 1;
                }
                last_period = period;
            } else {
                last_period = 4;
                if !game.play_period(4, REGULAR_OT_SECONDS, true, &mut rng) {
                    game.push(5, 0, EventType::PeriodStart, &mut rng);
                    let side = if rng.gen_bool(0.5) { Side::Home } else { Side::Away };
                    game.goal(5, 0, side, &mut rng);
                    game.push(5, 0, EventType::PeriodEnd, &mut rng);
                    last_period = 5;
                }
            }
        }
        let end_clock = game.events.last().map(|e| e.clock_seconds).unwrap_or(0);
        game.finish(last_period, end_clock, &mut rng);

        corpus.dates.push((game_id, date));
        corpus.events.append(&mut game.events);
        corpus.goals.append(&mut game.goals);
    }
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_corpus() {
        let cfg = SyntheticConfig {
            games: 5,
            ..SyntheticConfig::default()
        };
        let a = generate(&cfg);
        let b = generate(&cfg);
        assert_eq!(a.events, b.events);
        assert_eq!(a.goals, b.goals);
    }

    #[test]
    fn every_game_ends_and_event_numbers_increase() {
        let corpus = generate(&SyntheticConfig::default());
        for (game_id, _) in &corpus.dates {
            let rows: Vec<_> = corpus.events.iter().filter(|e| e.game_id == *game_id).collect();
            assert!(rows.windows(2).all(|w| w[0].event_number < w[1].event_number));
            assert_eq!(rows.last().map(|e| &e.event_type), Some(&EventType::GameEnd));
            assert!(rows.iter().all(|e| e.home_on_ice.len() <= 9 && e.away_on_ice.len() <= 9));
        }
        let goal_rows = corpus.events.iter().filter(|e| e.event_type.is_goal()).count();
        assert_eq!(goal_rows, corpus.goals.len());
    }
}
