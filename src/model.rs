use std::fmt;
use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type GameId = u64;
pub type PlayerId = u32;
pub type TeamId = u32;

pub const GAME_TYPE_REGULAR: u32 = 2;
pub const GAME_TYPE_PLAYOFFS: u32 = 3;

/// Game ids follow the `SSSSTTNNNN` layout: season start year, game type, game number.
pub fn game_type_of(game_id: GameId) -> u32 {
    ((game_id / 10_000) % 100) as u32
}

pub fn game_id_bounds(season: i32, game_type: u32) -> (GameId, GameId) {
    let base = season.max(0) as u64 * 1_000_000 + game_type as u64 * 10_000;
    (base, base + 9_999)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Goal,
    Shot,
    Faceoff,
    Penalty,
    PeriodStart,
    PeriodEnd,
    GameEnd,
    Other(String),
}

impl EventType {
    pub fn parse(raw: &str) -> Self {
        let norm = raw.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match norm.as_str() {
            "GOAL" => EventType::Goal,
            "SHOT" => EventType::Shot,
            "FACEOFF" | "FACE OFF" => EventType::Faceoff,
            "PENALTY" | "PENL" => EventType::Penalty,
            "PERIOD START" | "PSTR" => EventType::PeriodStart,
            "PERIOD END" | "PEND" => EventType::PeriodEnd,
            "GAME END" | "GEND" => EventType::GameEnd,
            _ => EventType::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::Goal => "GOAL",
            EventType::Shot => "SHOT",
            EventType::Faceoff => "FACEOFF",
            EventType::Penalty => "PENALTY",
            EventType::PeriodStart => "PERIOD START",
            EventType::PeriodEnd => "PERIOD END",
            EventType::GameEnd => "GAME END",
            EventType::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(self, EventType::Goal)
    }

    pub fn is_terminal_marker(&self) -> bool {
        matches!(self, EventType::PeriodEnd | EventType::GameEnd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// Terminal game result. Regulation results are `Win`/`Loss`; games decided
/// after regulation are `TieWin`/`TieLoss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    TieWin,
    TieLoss,
}

impl Outcome {
    pub fn flip(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::TieWin => Outcome::TieLoss,
            Outcome::TieLoss => Outcome::TieWin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::TieWin => "tie-win",
            Outcome::TieLoss => "tie-loss",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "win" => Some(Outcome::Win),
            "loss" => Some(Outcome::Loss),
            "tie-win" | "tie_win" => Some(Outcome::TieWin),
            "tie-loss" | "tie_loss" => Some(Outcome::TieLoss),
            _ => None,
        }
    }

    pub fn for_side(self, side: Side) -> Self {
        match side {
            Side::Home => self,
            Side::Away => self.flip(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    C,
    D,
    L,
    R,
    G,
}

impl Position {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "C" => Some(Position::C),
            "D" => Some(Position::D),
            "L" | "LW" => Some(Position::L),
            "R" | "RW" => Some(Position::R),
            "G" => Some(Position::G),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::C => "C",
            Position::D => "D",
            Position::L => "L",
            Position::R => "R",
            Position::G => "G",
        }
    }

    pub fn is_skater(self) -> bool {
        self != Position::G
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub position: Position,
}

/// One play-by-play row as stored, before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub clock_seconds: u32,
    pub event_type: EventType,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub external_event_id: Option<u64>,
    pub home_on_ice: Vec<PlayerId>,
    pub away_on_ice: Vec<PlayerId>,
    pub game_date: Option<NaiveDate>,
}

/// Authoritative goal record (scoring team and credited players).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDetail {
    pub game_id: GameId,
    pub event_number: u32,
    pub goal_id: Option<u64>,
    pub scoring_team_id: TeamId,
    pub scorer_id: PlayerId,
    pub first_assist_id: Option<PlayerId>,
    pub second_assist_id: Option<PlayerId>,
}

impl GoalDetail {
    pub fn assists(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.first_assist_id.into_iter().chain(self.second_assist_id)
    }
}

/// Goal difference and manpower difference from one team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GameState {
    pub goal_diff: i32,
    pub manpower_diff: i32,
}

impl GameState {
    pub fn new(goal_diff: i32, manpower_diff: i32) -> Self {
        Self {
            goal_diff,
            manpower_diff,
        }
    }

    pub fn flip(self) -> Self {
        Self {
            goal_diff: -self.goal_diff,
            manpower_diff: -self.manpower_diff,
        }
    }
}

/// A play-by-play row carrying reconstructed score, manpower, elapsed time and
/// the game's eventual outcome (home perspective).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub clock_seconds: u32,
    pub elapsed: u32,
    pub event_type: EventType,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub external_event_id: Option<u64>,
    pub scoring_team_id: Option<TeamId>,
    pub home_goals: u32,
    pub away_goals: u32,
    pub home_on_ice: Vec<PlayerId>,
    pub away_on_ice: Vec<PlayerId>,
    pub outcome: Outcome,
    pub game_date: Option<NaiveDate>,
}

impl EnrichedEvent {
    pub fn manpower(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_on_ice.len() as u32,
            Side::Away => self.away_on_ice.len() as u32,
        }
    }

    pub fn goals_for(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_goals,
            Side::Away => self.away_goals,
        }
    }

    pub fn goal_diff(&self, side: Side) -> i32 {
        self.goals_for(side) as i32 - self.goals_for(side.flip()) as i32
    }

    pub fn manpower_diff(&self, side: Side) -> i32 {
        self.manpower(side) as i32 - self.manpower(side.flip()) as i32
    }

    pub fn state(&self, side: Side) -> GameState {
        GameState::new(self.goal_diff(side), self.manpower_diff(side))
    }

    pub fn outcome_for(&self, side: Side) -> Outcome {
        self.outcome.for_side(side)
    }

    pub fn scoring_side(&self) -> Option<Side> {
        let team = self.scoring_team_id?;
        if team == self.home_team_id {
            Some(Side::Home)
        } else if team == self.away_team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn on_ice(&self, side: Side) -> &[PlayerId] {
        match side {
            Side::Home => &self.home_on_ice,
            Side::Away => &self.away_on_ice,
        }
    }
}

/// Counts of terminal outcomes observed in matching historical states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub win: u32,
    pub loss: u32,
    pub tie_win: u32,
    pub tie_loss: u32,
}

impl OutcomeTally {
    pub fn new(win: u32, loss: u32, tie_win: u32, tie_loss: u32) -> Self {
        Self {
            win,
            loss,
            tie_win,
            tie_loss,
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.win += 1,
            Outcome::Loss => self.loss += 1,
            Outcome::TieWin => self.tie_win += 1,
            Outcome::TieLoss => self.tie_loss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.win + self.loss + self.tie_win + self.tie_loss
    }

    pub fn flipped(self) -> Self {
        Self {
            win: self.loss,
            loss: self.win,
            tie_win: self.tie_loss,
            tie_loss: self.tie_win,
        }
    }

    pub fn for_side(self, side: Side) -> Self {
        match side {
            Side::Home => self,
            Side::Away => self.flipped(),
        }
    }
}

impl AddAssign for OutcomeTally {
    fn add_assign(&mut self, rhs: Self) {
        self.win += rhs.win;
        self.loss += rhs.loss;
        self.tie_win += rhs.tie_win;
        self.tie_loss += rhs.tie_loss;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_flip_is_an_involution_without_fixed_points() {
        for o in [Outcome::Win, Outcome::Loss, Outcome::TieWin, Outcome::TieLoss] {
            assert_ne!(o, o.flip());
            assert_eq!(o, o.flip().flip());
            assert_eq!(Outcome::parse(o.as_str()), Some(o));
        }
    }

    #[test]
    fn game_id_layout() {
        assert_eq!(game_type_of(2013020456), GAME_TYPE_REGULAR);
        assert_eq!(game_type_of(2013030111), GAME_TYPE_PLAYOFFS);
        assert_eq!(game_id_bounds(2013, 2), (2013020000, 2013029999));
    }

    #[test]
    fn event_type_parse_accepts_feed_spellings() {
        assert_eq!(EventType::parse("period end"), EventType::PeriodEnd);
        assert_eq!(EventType::parse("GAME_END"), EventType::GameEnd);
        assert_eq!(EventType::parse("Goal"), EventType::Goal);
        assert_eq!(EventType::parse("HIT"), EventType::Other("HIT".to_string()));
    }

    #[test]
    fn tally_flip_swaps_regulation_and_overtime_pairs() {
        let t = OutcomeTally::new(4, 1, 3, 2).flipped();
        assert_eq!(t, OutcomeTally::new(1, 4, 2, 3));
    }
}
