use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{EnrichedEvent, GameId, GoalDetail, Player, PlayerId, Position};
use crate::reward::RewardRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Goals,
    Assists,
    FirstAssists,
    Points,
    PlusMinus,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Goals,
        MetricKind::Assists,
        MetricKind::FirstAssists,
        MetricKind::Points,
        MetricKind::PlusMinus,
    ];

    pub fn stem(self) -> &'static str {
        match self {
            MetricKind::Goals => "goals",
            MetricKind::Assists => "assists",
            MetricKind::FirstAssists => "first_assists",
            MetricKind::Points => "points",
            MetricKind::PlusMinus => "plusminus",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let norm = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        MetricKind::ALL
            .into_iter()
            .find(|k| k.stem() == norm || (norm == "plus_minus" && *k == MetricKind::PlusMinus))
    }

    pub fn table_name(self, suffix: &str) -> String {
        format!("weighted_{}_ranked{suffix}", self.stem())
    }

    pub fn title(self) -> &'static str {
        match self {
            MetricKind::Goals => "Goals",
            MetricKind::Assists => "Assists",
            MetricKind::FirstAssists => "First Assists",
            MetricKind::Points => "Points",
            MetricKind::PlusMinus => "PlusMinus",
        }
    }
}

/// One player's traditional and weighted value for a metric. `weighted` is
/// full precision; use [`round3`] when presenting or storing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub player_id: PlayerId,
    pub name: String,
    pub position: Position,
    pub traditional: i64,
    pub weighted: f64,
    pub rank_traditional: u32,
    pub rank_weighted: u32,
    pub rank_diff: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTable {
    pub kind: MetricKind,
    /// Ordered by weighted rank.
    pub records: Vec<MetricRecord>,
}

impl MetricTable {
    pub fn get(&self, player_id: PlayerId) -> Option<&MetricRecord> {
        self.records.iter().find(|r| r.player_id == player_id)
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A rewarded goal with everyone it should be credited to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditedGoal {
    pub game_id: GameId,
    pub event_number: u32,
    pub period: u8,
    pub reward: f64,
    pub scorer_id: PlayerId,
    pub first_assist_id: Option<PlayerId>,
    pub second_assist_id: Option<PlayerId>,
    pub scoring_manpower_diff: i32,
    pub scoring_on_ice: Vec<PlayerId>,
    pub conceding_on_ice: Vec<PlayerId>,
}

impl CreditedGoal {
    /// Plus-minus for the scoring side: nothing on the power play, otherwise +1.
    /// The conceding side gets the negation.
    pub fn plus_minus_sign(&self) -> i64 {
        if self.scoring_manpower_diff > 0 { 0 } else { 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub goals_in: usize,
    pub goals_credited: usize,
    pub outside_regulation: usize,
    pub missing_context: usize,
    pub non_skaters_dropped: usize,
}

/// Join rewards with goal records and on-ice rosters. Only goals scored in
/// periods `1..=regulation_periods` are kept.
pub fn credited_goals(
    rewards: &[RewardRow],
    details: &HashMap<(GameId, u32), &GoalDetail>,
    events: &HashMap<(GameId, u32), &EnrichedEvent>,
    regulation_periods: u8,
    stats: &mut AggregateStats,
) -> Vec<CreditedGoal> {
    stats.goals_in = rewards.len();
    let mut out = Vec::with_capacity(rewards.len());
    for reward in rewards {
        if reward.period == 0 || reward.period > regulation_periods {
            stats.outside_regulation += 1;
            continue;
        }
        let key = (reward.game_id, reward.event_number);
        let (Some(detail), Some(event)) = (details.get(&key), events.get(&key)) else {
            stats.missing_context += 1;
            continue;
        };
        let Some(side) = event.scoring_side() else {
            stats.missing_context += 1;
            continue;
        };
        out.push(CreditedGoal {
            game_id: reward.game_id,
            event_number: reward.event_number,
            period: reward.period,
            reward: reward.reward,
            scorer_id: detail.scorer_id,
            first_assist_id: detail.first_assist_id,
            second_assist_id: detail.second_assist_id,
            scoring_manpower_diff: event.manpower_diff(side),
            scoring_on_ice: event.on_ice(side).to_vec(),
            conceding_on_ice: event.on_ice(side.flip()).to_vec(),
        });
    }
    stats.goals_credited = out.len();
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    traditional: i64,
    weighted: f64,
}

impl Totals {
    fn add(&mut self, count: i64, reward: f64) {
        self.traditional += count;
        self.weighted += reward;
    }
}

type TotalsMap = HashMap<PlayerId, Totals>;

fn goals_totals(goals: &[CreditedGoal]) -> TotalsMap {
    let mut map = TotalsMap::new();
    for g in goals {
        map.entry(g.scorer_id).or_default().add(1, g.reward);
    }
    map
}

fn assists_totals(goals: &[CreditedGoal], first_only: bool) -> TotalsMap {
    let mut map = TotalsMap::new();
    for g in goals {
        // each assist gets the full, unsplit reward
        if let Some(id) = g.first_assist_id {
            map.entry(id).or_default().add(1, g.reward);
        }
        if !first_only && let Some(id) = g.second_assist_id {
            map.entry(id).or_default().add(1, g.reward);
        }
    }
    map
}

fn points_totals(goals: &TotalsMap, assists: &TotalsMap) -> TotalsMap {
    let mut map = TotalsMap::new();
    for (id, t) in goals.iter().chain(assists.iter()) {
        map.entry(*id).or_default().add(t.traditional, t.weighted);
    }
    map
}

fn plus_minus_totals(goals: &[CreditedGoal]) -> TotalsMap {
    let mut map = TotalsMap::new();
    for g in goals {
        let sign = g.plus_minus_sign();
        let mut seen = HashSet::new();
        for (players, side_sign) in [(&g.scoring_on_ice, sign), (&g.conceding_on_ice, -sign)] {
            for id in players {
                if !seen.insert(*id) {
                    continue;
                }
                map.entry(*id)
                    .or_default()
                    .add(side_sign, g.reward * side_sign as f64);
            }
        }
    }
    map
}

/// Attach roster data, drop non-skaters and rank.
fn build_table(
    kind: MetricKind,
    totals: TotalsMap,
    roster: &HashMap<PlayerId, Player>,
    stats: &mut AggregateStats,
) -> MetricTable {
    let mut records = Vec::with_capacity(totals.len());
    for (player_id, t) in totals {
        let Some(player) = roster.get(&player_id).filter(|p| p.position.is_skater()) else {
            stats.non_skaters_dropped += 1;
            continue;
        };
        records.push(MetricRecord {
            player_id,
            name: player.name.clone(),
            position: player.position,
            traditional: t.traditional,
            weighted: t.weighted,
            rank_traditional: 0,
            rank_weighted: 0,
            rank_diff: 0,
        });
    }
    rank_records(&mut records);
    MetricTable { kind, records }
}

/// Assign 1..N ranks: weighted rank with ties broken by player id, traditional
/// rank with ties broken by weighted rank. Leaves records in weighted order.
pub fn rank_records(records: &mut [MetricRecord]) {
    records.sort_by(|a, b| {
        b.weighted
            .total_cmp(&a.weighted)
            .then(a.player_id.cmp(&b.player_id))
    });
    for (i, r) in records.iter_mut().enumerate() {
        r.rank_weighted = i as u32 + 1;
    }

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        records[b]
            .traditional
            .cmp(&records[a].traditional)
            .then(records[a].rank_weighted.cmp(&records[b].rank_weighted))
    });
    for (rank, idx) in order.into_iter().enumerate() {
        let r = &mut records[idx];
        r.rank_traditional = rank as u32 + 1;
        r.rank_diff = i64::from(r.rank_traditional) - i64::from(r.rank_weighted);
    }
}

/// Compute all five metric tables for the credited goals.
pub fn aggregate(
    goals: &[CreditedGoal],
    roster: &HashMap<PlayerId, Player>,
    stats: &mut AggregateStats,
) -> Vec<MetricTable> {
    let goals_map = goals_totals(goals);
    let assists_map = assists_totals(goals, false);
    let first_map = assists_totals(goals, true);
    let points_map = points_totals(&goals_map, &assists_map);
    let pm_map = plus_minus_totals(goals);

    let tables = vec![
        build_table(MetricKind::Goals, goals_map, roster, stats),
        build_table(MetricKind::Assists, assists_map, roster, stats),
        build_table(MetricKind::FirstAssists, first_map, roster, stats),
        build_table(MetricKind::Points, points_map, roster, stats),
        build_table(MetricKind::PlusMinus, pm_map, roster, stats),
    ];
    for t in &tables {
        debug!(metric = t.kind.stem(), players = t.records.len(), "metric table built");
    }
    tables
}
