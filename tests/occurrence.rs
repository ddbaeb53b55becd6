use std::collections::BTreeMap;

use gpiv::config::RinkRules;
use gpiv::model::{
    EnrichedEvent, EventType, GameId, GameState, GoalDetail, OutcomeTally, RawEvent, Side,
};
use gpiv::occurrence::{OccurrenceIndex, count_occurrences, goal_snapshots};
use gpiv::reconstruct::reconstruct;
use gpiv::synthetic::{SyntheticConfig, generate};

fn enriched_corpus(seed: u64, games: usize) -> Vec<EnrichedEvent> {
    let corpus = generate(&SyntheticConfig {
        seed,
        games,
        ..SyntheticConfig::default()
    });
    reconstruct(corpus.events, &corpus.goals, &RinkRules::default()).events
}

fn by_game(events: &[EnrichedEvent]) -> BTreeMap<GameId, Vec<&EnrichedEvent>> {
    let mut games: BTreeMap<GameId, Vec<&EnrichedEvent>> = BTreeMap::new();
    for e in events {
        games.entry(e.game_id).or_default().push(e);
    }
    for rows in games.values_mut() {
        rows.sort_by_key(|e| e.event_number);
    }
    games
}

fn observe(tally: &mut OutcomeTally, row: &EnrichedEvent, state: GameState) {
    if row.state(Side::Home) == state {
        tally.record(row.outcome_for(Side::Home));
    }
    if row.state(Side::Away) == state {
        tally.record(row.outcome_for(Side::Away));
    }
}

// Straight scan over every reference game, no index.
fn naive_before(reference: &[EnrichedEvent], elapsed: u32, state: GameState) -> OutcomeTally {
    let mut tally = OutcomeTally::default();
    for rows in by_game(reference).values() {
        if let Some(row) = rows
            .iter()
            .filter(|e| e.elapsed > 0 && e.elapsed < elapsed)
            .last()
        {
            observe(&mut tally, row, state);
        }
    }
    tally
}

fn naive_after(reference: &[EnrichedEvent], elapsed: u32, state: GameState) -> OutcomeTally {
    let mut tally = OutcomeTally::default();
    for rows in by_game(reference).values() {
        if let Some(row) = rows
            .iter()
            .find(|e| !e.event_type.is_goal() && e.elapsed >= elapsed)
        {
            observe(&mut tally, row, state);
        }
    }
    tally
}

#[test]
fn indexed_counts_match_a_full_scan() {
    let reference = enriched_corpus(7, 25);
    let goals_source = enriched_corpus(11, 6);
    let snapshots = goal_snapshots(&goals_source);
    assert!(!snapshots.is_empty());

    let index = OccurrenceIndex::build(&reference);
    assert_eq!(index.game_count(), 25);
    let rows = count_occurrences(&snapshots, &index);

    for (snap, row) in snapshots.iter().zip(&rows) {
        let before = naive_before(&reference, snap.before.elapsed, snap.before.state)
            .for_side(snap.scoring_side);
        assert_eq!(row.before, before, "before tally for {:?}", (snap.game_id, snap.event_number));
        let after = snap
            .after
            .map(|a| naive_after(&reference, a.elapsed, a.state).for_side(snap.scoring_side))
            .unwrap_or_default();
        assert_eq!(row.after, after, "after tally for {:?}", (snap.game_id, snap.event_number));
    }
}

#[test]
fn output_order_follows_goal_order() {
    let events = enriched_corpus(3, 20);
    let snapshots = goal_snapshots(&events);
    let index = OccurrenceIndex::build(&events);
    let rows = count_occurrences(&snapshots, &index);
    assert_eq!(rows.len(), snapshots.len());
    let expected: Vec<_> = snapshots.iter().map(|s| (s.game_id, s.event_number)).collect();
    let got: Vec<_> = rows.iter().map(|r| (r.game_id, r.event_number)).collect();
    assert_eq!(got, expected);
}

#[test]
fn states_are_reported_from_the_scoring_side() {
    let events = enriched_corpus(5, 15);
    let snapshots = goal_snapshots(&events);
    let index = OccurrenceIndex::build(&events);
    for row in count_occurrences(&snapshots, &index) {
        // after the goal the scorer is one goal better off than before it
        if let Some(after) = row.after_state {
            assert_eq!(after.goal_diff, row.before_state.goal_diff + 1);
        }
    }
}

fn tiny_game(game_id: GameId, home_wins: bool) -> (Vec<RawEvent>, Vec<GoalDetail>) {
    let raw = |event_number: u32, period: u8, clock: u32, event_type: EventType| RawEvent {
        game_id,
        event_number,
        period,
        clock_seconds: clock,
        event_type,
        home_team_id: 1,
        away_team_id: 2,
        external_event_id: None,
        home_on_ice: vec![10, 11, 12, 13, 14, 15],
        away_on_ice: vec![20, 21, 22, 23, 24, 25],
        game_date: None,
    };
    let scoring_team = if home_wins { 1 } else { 2 };
    let events = vec![
        raw(1, 1, 0, EventType::PeriodStart),
        raw(2, 1, 60, EventType::Faceoff),
        raw(3, 2, 100, EventType::Goal),
        raw(4, 2, 100, EventType::Faceoff),
        raw(5, 3, 1200, EventType::PeriodEnd),
        raw(6, 3, 1200, EventType::GameEnd),
    ];
    let goals = vec![GoalDetail {
        game_id,
        event_number: 3,
        goal_id: None,
        scoring_team_id: scoring_team,
        scorer_id: scoring_team * 10,
        first_assist_id: None,
        second_assist_id: None,
    }];
    (events, goals)
}

#[test]
fn even_state_counts_both_teams_of_a_game() {
    let (mut events, mut goals) = tiny_game(2013020001, true);
    let (more_events, more_goals) = tiny_game(2013020002, false);
    events.extend(more_events);
    goals.extend(more_goals);
    let reference = reconstruct(events, &goals, &RinkRules::default()).events;
    let index = OccurrenceIndex::build(&reference);

    // at 5 minutes both games sit at 0-0, each contributes a win and a loss
    let even = index.count_before(300, GameState::new(0, 0));
    assert_eq!(even, OutcomeTally::new(2, 2, 0, 0));

    // right after the goal: game one has home +1, game two has away +1
    let up_one = index.count_after(1300, GameState::new(1, 0));
    assert_eq!(up_one, OutcomeTally::new(2, 0, 0, 0));
    let down_one = index.count_after(1300, GameState::new(-1, 0));
    assert_eq!(down_one, OutcomeTally::new(0, 2, 0, 0));
}

#[test]
fn goal_on_the_last_row_has_an_empty_after_tally() {
    let game_id = 2013020001;
    let mut events = Vec::new();
    for (n, (period, clock, event_type)) in [
        (1, 0, EventType::PeriodStart),
        (3, 1200, EventType::GameEnd),
        (3, 1200, EventType::Goal),
    ]
    .into_iter()
    .enumerate()
    {
        events.push(RawEvent {
            game_id,
            event_number: n as u32 + 1,
            period,
            clock_seconds: clock,
            event_type,
            home_team_id: 1,
            away_team_id: 2,
            external_event_id: None,
            home_on_ice: vec![1, 2, 3, 4, 5, 6],
            away_on_ice: vec![7, 8, 9, 10, 11, 12],
            game_date: None,
        });
    }
    let goals = vec![GoalDetail {
        game_id,
        event_number: 3,
        goal_id: None,
        scoring_team_id: 2,
        scorer_id: 7,
        first_assist_id: None,
        second_assist_id: None,
    }];
    let reference = reconstruct(events, &goals, &RinkRules::default()).events;
    let snapshots = goal_snapshots(&reference);
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].after.is_none());
    assert_eq!(snapshots[0].scoring_side, Side::Away);

    let rows = count_occurrences(&snapshots, &OccurrenceIndex::build(&reference));
    assert_eq!(rows[0].after, OutcomeTally::default());
    assert_eq!(rows[0].after_state, None);
}
