use gpiv::config::RinkRules;
use gpiv::error::ExclusionReason;
use gpiv::model::{EventType, GameId, GoalDetail, Outcome, RawEvent, Side, TeamId};
use gpiv::reconstruct::reconstruct;
use gpiv::synthetic::{SyntheticConfig, generate};

const HOME: TeamId = 1;
const AWAY: TeamId = 2;
const REGULAR: GameId = 2013020001;
const PLAYOFF: GameId = 2013030001;

struct GameSheet {
    game_id: GameId,
    events: Vec<RawEvent>,
    goals: Vec<GoalDetail>,
}

impl GameSheet {
    fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            events: Vec::new(),
            goals: Vec::new(),
        }
    }

    fn row(&mut self, period: u8, clock: u32, event_type: EventType, skaters: (u32, u32)) -> u32 {
        let event_number = self.events.len() as u32 + 1;
        self.events.push(RawEvent {
            game_id: self.game_id,
            event_number,
            period,
            clock_seconds: clock,
            event_type,
            home_team_id: HOME,
            away_team_id: AWAY,
            external_event_id: None,
            home_on_ice: (0..skaters.0 + 1).map(|k| 100 + k).collect(),
            away_on_ice: (0..skaters.1 + 1).map(|k| 200 + k).collect(),
            game_date: None,
        });
        event_number
    }

    fn event(&mut self, period: u8, clock: u32, event_type: EventType) -> &mut Self {
        self.row(period, clock, event_type, (5, 5));
        self
    }

    fn goal(&mut self, period: u8, clock: u32, team: TeamId) -> &mut Self {
        let event_number = self.row(period, clock, EventType::Goal, (5, 5));
        self.goals.push(GoalDetail {
            game_id: self.game_id,
            event_number,
            goal_id: Some(u64::from(event_number)),
            scoring_team_id: team,
            scorer_id: team * 100 + 1,
            first_assist_id: None,
            second_assist_id: None,
        });
        self
    }

    fn regulation(&mut self) -> &mut Self {
        for period in 1..=3 {
            self.event(period, 0, EventType::PeriodStart)
                .event(period, 1200, EventType::PeriodEnd);
        }
        self
    }
}

#[test]
fn goal_row_carries_the_score_before_the_goal() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart)
        .goal(1, 100, HOME)
        .event(1, 100, EventType::Faceoff)
        .goal(1, 500, AWAY)
        .event(1, 600, EventType::Shot)
        .goal(2, 30, HOME)
        .event(3, 1200, EventType::PeriodEnd)
        .event(3, 1200, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    let scores: Vec<(u32, u32)> = rebuilt
        .events
        .iter()
        .map(|e| (e.home_goals, e.away_goals))
        .collect();
    assert_eq!(
        scores,
        vec![(0, 0), (0, 0), (1, 0), (1, 0), (1, 1), (1, 1), (2, 1), (2, 1)]
    );
    let goal_rows: Vec<_> = rebuilt
        .events
        .iter()
        .filter(|e| e.event_type.is_goal())
        .collect();
    assert_eq!(goal_rows[0].scoring_side(), Some(Side::Home));
    assert_eq!(goal_rows[1].scoring_side(), Some(Side::Away));
    assert!(rebuilt.events.iter().all(|e| e.outcome == Outcome::Win));
    assert_eq!(rebuilt.events[5].elapsed, 1230);
}

#[test]
fn perspectives_are_complementary_on_every_row() {
    let corpus = generate(&SyntheticConfig {
        games: 30,
        ..SyntheticConfig::default()
    });
    let rebuilt = reconstruct(corpus.events, &corpus.goals, &RinkRules::default());
    assert_eq!(rebuilt.stats.games_kept, 30);
    for e in &rebuilt.events {
        assert_eq!(e.state(Side::Home), e.state(Side::Away).flip());
        assert_eq!(e.outcome_for(Side::Home), e.outcome_for(Side::Away).flip());
        assert_eq!(
            e.manpower_diff(Side::Home),
            e.home_on_ice.len() as i32 - e.away_on_ice.len() as i32
        );
    }
}

#[test]
fn shootout_rows_are_dropped_after_deciding_the_outcome() {
    let mut g = GameSheet::new(REGULAR);
    g.regulation()
        .event(4, 0, EventType::PeriodStart)
        .event(4, 300, EventType::PeriodEnd)
        .event(5, 0, EventType::PeriodStart)
        .goal(5, 0, HOME)
        .event(5, 0, EventType::PeriodEnd)
        .event(5, 0, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert_eq!(rebuilt.stats.games_kept, 1);
    assert_eq!(rebuilt.stats.shootout_events_dropped, 4);
    assert!(rebuilt.events.iter().all(|e| e.period < 5));
    assert!(rebuilt.events.iter().all(|e| e.outcome == Outcome::TieWin));
    assert!(rebuilt.events.iter().all(|e| e.home_goals == 0 && e.away_goals == 0));
}

#[test]
fn playoff_overtime_goal_is_a_tie_result_and_kept() {
    let mut g = GameSheet::new(PLAYOFF);
    g.regulation()
        .event(4, 0, EventType::PeriodStart)
        .event(5, 0, EventType::PeriodStart)
        .goal(5, 412, AWAY)
        .event(5, 412, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert_eq!(rebuilt.stats.shootout_events_dropped, 0);
    assert_eq!(rebuilt.events.len(), 10);
    let last = rebuilt.events.last().map(|e| (e.home_goals, e.away_goals, e.outcome));
    assert_eq!(last, Some((0, 1, Outcome::TieLoss)));
}

#[test]
fn game_without_end_marker_is_excluded() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart)
        .goal(1, 50, HOME)
        .event(1, 1200, EventType::PeriodEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert!(rebuilt.events.is_empty());
    assert_eq!(rebuilt.stats.games_missing_outcome, 1);
    assert_eq!(rebuilt.exclusions.len(), 1);
    assert_eq!(rebuilt.exclusions[0].reason, ExclusionReason::MissingOutcome);
}

#[test]
fn overtime_goal_with_regulation_ending_is_corrupt() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart)
        .goal(4, 100, HOME)
        .event(3, 1200, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert!(rebuilt.events.is_empty());
    assert_eq!(rebuilt.stats.games_corrupt, 1);
    assert_eq!(rebuilt.exclusions[0].reason, ExclusionReason::CorruptOvertime);
}

#[test]
fn tied_final_score_is_excluded() {
    let mut g = GameSheet::new(PLAYOFF);
    g.regulation().event(3, 1200, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert!(rebuilt.events.is_empty());
    assert_eq!(rebuilt.stats.games_tied, 1);
    assert_eq!(rebuilt.exclusions[0].reason, ExclusionReason::TiedFinalScore);
}

#[test]
fn goal_without_record_does_not_move_the_score() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart).goal(1, 200, HOME);
    g.row(1, 300, EventType::Goal, (5, 5));
    g.event(1, 400, EventType::Shot)
        .event(3, 1200, EventType::PeriodEnd)
        .event(3, 1200, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    assert_eq!(rebuilt.stats.goals_in, 2);
    assert_eq!(rebuilt.stats.goals_missing_detail, 1);
    assert!((rebuilt.stats.missing_goal_fraction() - 0.5).abs() < 1e-12);
    let shot = rebuilt
        .events
        .iter()
        .find(|e| e.event_type == EventType::Shot)
        .map(|e| (e.home_goals, e.away_goals));
    assert_eq!(shot, Some((1, 0)));
    let missing: Vec<_> = rebuilt
        .exclusions
        .iter()
        .filter(|x| x.reason == ExclusionReason::MissingGoalDetail)
        .map(|x| x.event_number)
        .collect();
    assert_eq!(missing, vec![Some(3)]);
    let unscored = rebuilt.events.iter().find(|e| e.event_number == 3);
    assert_eq!(unscored.and_then(|e| e.scoring_team_id), None);
}

#[test]
fn events_are_ordered_by_event_number_within_a_game() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart)
        .goal(1, 10, AWAY)
        .event(1, 20, EventType::Shot)
        .event(3, 1200, EventType::GameEnd);
    let mut shuffled = g.events.clone();
    shuffled.reverse();

    let rebuilt = reconstruct(shuffled, &g.goals, &RinkRules::default());
    let numbers: Vec<u32> = rebuilt.events.iter().map(|e| e.event_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(rebuilt.events[2].away_goals, 1);
    assert!(rebuilt.events.iter().all(|e| e.outcome == Outcome::Loss));
}

#[test]
fn manpower_reflects_on_ice_counts() {
    let mut g = GameSheet::new(REGULAR);
    g.event(1, 0, EventType::PeriodStart);
    g.row(1, 90, EventType::Penalty, (4, 5));
    g.goal(1, 120, AWAY)
        .event(3, 1200, EventType::GameEnd);

    let rebuilt = reconstruct(g.events, &g.goals, &RinkRules::default());
    let penalty = &rebuilt.events[1];
    assert_eq!(penalty.manpower_diff(Side::Home), -1);
    assert_eq!(penalty.manpower_diff(Side::Away), 1);
}
