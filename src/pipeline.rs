use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{RinkRules, RunConfig};
use crate::error::{ConfigError, Exclusion, PipelineError, Stage};
use crate::model::{EnrichedEvent, GameId, GoalDetail, Player, PlayerId, Position, RawEvent};
use crate::occurrence::{OccurrenceIndex, OccurrenceRow, count_occurrences, goal_snapshots};
use crate::partition::{CorpusQuery, PartitionSelector, sanitize_suffix};
use crate::reconstruct::{ReconstructStats, reconstruct};
use crate::reward::{RewardRow, RewardStats, apply_reward};
use crate::store::{Store, mpbp_table};
use crate::weighted::{AggregateStats, MetricTable, aggregate, credited_goals};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub rules: RinkRules,
    pub positions: Option<Vec<Position>>,
    pub max_missing_goal_fraction: f64,
    pub skip_occurrences: bool,
    /// Suffix to read reused occurrences from; the output suffix when `None`.
    pub occurrences_suffix: Option<String>,
    pub suffix_override: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            rules: RinkRules::default(),
            positions: None,
            max_missing_goal_fraction: 0.05,
            skip_occurrences: false,
            occurrences_suffix: None,
            suffix_override: None,
        }
    }
}

impl RunOptions {
    pub fn from_config(cfg: &RunConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            rules: RinkRules::default(),
            positions: cfg.position_filter()?,
            max_missing_goal_fraction: cfg.max_missing_goal_fraction,
            skip_occurrences: cfg.skip_occurrences,
            occurrences_suffix: cfg.occurrences_suffix.clone(),
            suffix_override: cfg.suffix.clone(),
        })
    }
}

/// Raw inputs for one corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusData {
    pub events: Vec<RawEvent>,
    pub goals: Vec<GoalDetail>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub label: String,
    pub suffix: String,
    pub reference: ReconstructStats,
    pub evaluation: Option<ReconstructStats>,
    pub exclusions: Vec<Exclusion>,
    pub goals_counted: usize,
    pub occurrences_reused: bool,
    pub reward: RewardStats,
    pub aggregate: AggregateStats,
    pub metric_players: Vec<(String, usize)>,
    pub elapsed_ms: u128,
}

/// Everything a partition run produces before it is written out.
#[derive(Debug, Clone, Default)]
pub struct PartitionOutput {
    pub reference_events: Vec<EnrichedEvent>,
    pub evaluation_events: Option<Vec<EnrichedEvent>>,
    pub occurrences: Vec<OccurrenceRow>,
    pub rewards: Vec<RewardRow>,
    pub tables: Vec<MetricTable>,
    pub report: RunReport,
}

fn check_missing_goals(
    label: &str,
    stats: &ReconstructStats,
    limit: f64,
) -> Result<(), PipelineError> {
    let fraction = stats.missing_goal_fraction();
    if fraction > limit {
        return Err(PipelineError::new(
            label,
            Stage::Reconstruct,
            format!(
                "{} of {} goals ({:.1}%) have no goal record, above the {:.1}% limit; wrong tables or partition?",
                stats.goals_missing_detail,
                stats.goals_in,
                fraction * 100.0,
                limit * 100.0
            ),
        ));
    }
    Ok(())
}

fn check_reused(
    label: &str,
    rows: &[OccurrenceRow],
    goal_events: &[EnrichedEvent],
) -> Result<(), PipelineError> {
    let goals: HashSet<(GameId, u32)> = goal_events
        .iter()
        .filter(|e| e.event_type.is_goal())
        .map(|e| (e.game_id, e.event_number))
        .collect();
    if let Some(stray) = rows
        .iter()
        .find(|r| !goals.contains(&(r.game_id, r.event_number)))
    {
        return Err(PipelineError::new(
            label,
            Stage::Reward,
            format!(
                "stored occurrence row for event {} has no goal in this corpus; counted for another partition?",
                stray.event_number
            ),
        )
        .with_game(stray.game_id));
    }
    Ok(())
}

fn log_reconstruction(label: &str, corpus: &str, stats: &ReconstructStats) {
    info!(
        partition = label,
        corpus,
        games_in = stats.games_in,
        games_kept = stats.games_kept,
        missing_outcome = stats.games_missing_outcome,
        tied = stats.games_tied,
        corrupt = stats.games_corrupt,
        events_in = stats.events_in,
        events_out = stats.events_out,
        shootout_dropped = stats.shootout_events_dropped,
        goals_missing_detail = stats.goals_missing_detail,
        "reconstructed events"
    );
}

/// Run reconstruct, count, reward and aggregate over in-memory corpora.
///
/// Occurrence statistics always come from `reference`; goals come from
/// `evaluation` when given. `reused` skips counting and uses stored rows.
pub fn run_corpus(
    label: &str,
    reference: CorpusData,
    evaluation: Option<CorpusData>,
    roster: &HashMap<PlayerId, Player>,
    opts: &RunOptions,
    reused: Option<Vec<OccurrenceRow>>,
) -> Result<PartitionOutput, PipelineError> {
    let started = Instant::now();
    let mut report = RunReport {
        label: label.to_string(),
        ..RunReport::default()
    };

    let rebuilt = reconstruct(reference.events, &reference.goals, &opts.rules);
    log_reconstruction(label, "reference", &rebuilt.stats);
    check_missing_goals(label, &rebuilt.stats, opts.max_missing_goal_fraction)?;
    report.reference = rebuilt.stats;
    report.exclusions = rebuilt.exclusions;
    let reference_events = rebuilt.events;

    let (evaluation_events, evaluation_goals) = match evaluation {
        Some(corpus) => {
            let rebuilt = reconstruct(corpus.events, &corpus.goals, &opts.rules);
            log_reconstruction(label, "evaluation", &rebuilt.stats);
            check_missing_goals(label, &rebuilt.stats, opts.max_missing_goal_fraction)?;
            report.evaluation = Some(rebuilt.stats);
            report.exclusions.extend(rebuilt.exclusions);
            (Some(rebuilt.events), corpus.goals)
        }
        None => (None, reference.goals),
    };
    let goal_events: &[EnrichedEvent] = evaluation_events.as_deref().unwrap_or(&reference_events);
    if goal_events.is_empty() {
        warn!(partition = label, "no events survived reconstruction");
    }

    let occurrences = match reused {
        Some(rows) => {
            check_reused(label, &rows, goal_events)?;
            info!(partition = label, rows = rows.len(), "reusing stored occurrences");
            report.occurrences_reused = true;
            rows
        }
        None => {
            let snapshots = goal_snapshots(goal_events);
            let index = OccurrenceIndex::build(&reference_events);
            let rows = count_occurrences(&snapshots, &index);
            info!(
                partition = label,
                goals = snapshots.len(),
                reference_games = index.game_count(),
                "counted occurrences"
            );
            rows
        }
    };
    report.goals_counted = occurrences.len();

    let scorers: HashMap<(GameId, u32), PlayerId> = evaluation_goals
        .iter()
        .map(|g| ((g.game_id, g.event_number), g.scorer_id))
        .collect();
    let (rewards, reward_stats) =
        apply_reward(&occurrences, &scorers, roster, opts.positions.as_deref());
    info!(
        partition = label,
        goals_in = reward_stats.goals_in,
        goals_out = reward_stats.goals_out,
        missing_detail = reward_stats.missing_detail,
        filtered_by_position = reward_stats.filtered_by_position,
        "computed rewards"
    );
    report.reward = reward_stats;

    let details: HashMap<(GameId, u32), &GoalDetail> = evaluation_goals
        .iter()
        .map(|g| ((g.game_id, g.event_number), g))
        .collect();
    let event_index: HashMap<(GameId, u32), &EnrichedEvent> = goal_events
        .iter()
        .filter(|e| e.event_type.is_goal())
        .map(|e| ((e.game_id, e.event_number), e))
        .collect();
    let mut agg_stats = AggregateStats::default();
    let credited = credited_goals(
        &rewards,
        &details,
        &event_index,
        opts.rules.regulation_periods,
        &mut agg_stats,
    );
    let tables = aggregate(&credited, roster, &mut agg_stats);
    info!(
        partition = label,
        goals_in = agg_stats.goals_in,
        credited = agg_stats.goals_credited,
        outside_regulation = agg_stats.outside_regulation,
        missing_context = agg_stats.missing_context,
        non_skaters_dropped = agg_stats.non_skaters_dropped,
        "aggregated weighted metrics"
    );
    report.aggregate = agg_stats;
    report.metric_players = tables
        .iter()
        .map(|t| (t.kind.stem().to_string(), t.records.len()))
        .collect();
    report.elapsed_ms = started.elapsed().as_millis();

    Ok(PartitionOutput {
        reference_events,
        evaluation_events,
        occurrences,
        rewards,
        tables,
        report,
    })
}

/// Resolve, load, compute and write one partition. Output tables are written
/// only after every stage succeeded; each table swap is atomic.
pub fn run_partition(
    store: &mut Store,
    selector: &PartitionSelector,
    opts: &RunOptions,
) -> Result<RunReport, PipelineError> {
    let selector_label = selector.label();
    let resolved = selector
        .resolve(&*store)
        .map_err(|e| PipelineError::new(&selector_label, Stage::Resolve, e))?;
    let label = resolved.label.clone();
    let suffix = match &opts.suffix_override {
        Some(raw) => sanitize_suffix(raw),
        None => resolved.suffix.clone(),
    };
    info!(partition = %label, suffix = %suffix, "starting partition run");
    if let Some(segment) = resolved.segment {
        info!(
            partition = %label,
            start = %segment.start,
            end = %segment.end,
            games = segment.games,
            "partition dates"
        );
    }

    let load = |query: &CorpusQuery| -> Result<CorpusData, PipelineError> {
        let events = store
            .load_events(query)
            .map_err(|e| PipelineError::new(&label, Stage::Load, e))?;
        let goals = store
            .load_goals(query)
            .map_err(|e| PipelineError::new(&label, Stage::Load, e))?;
        Ok(CorpusData { events, goals })
    };
    let reference = load(&resolved.reference)?;
    let evaluation = match &resolved.evaluation {
        Some(query) => Some(load(query)?),
        None => None,
    };
    let roster = store
        .load_roster()
        .map_err(|e| PipelineError::new(&label, Stage::Load, e))?;
    info!(
        partition = %label,
        reference_events = reference.events.len(),
        evaluation_events = evaluation.as_ref().map(|c| c.events.len()).unwrap_or(0),
        players = roster.len(),
        "loaded corpus"
    );

    let reused = if opts.skip_occurrences {
        let source = match &opts.occurrences_suffix {
            Some(raw) => sanitize_suffix(raw),
            None => suffix.clone(),
        };
        info!(partition = %label, source = %source, "loading stored occurrences");
        Some(
            store
                .load_occurrences(&source)
                .map_err(|e| PipelineError::new(&label, Stage::CountOccurrences, e))?,
        )
    } else {
        None
    };

    let mut output = run_corpus(&label, reference, evaluation, &roster, opts, reused)?;
    output.report.suffix = suffix.clone();

    let write_err = |e: anyhow::Error| PipelineError::new(&label, Stage::Write, e);
    store
        .write_enriched(&mpbp_table(&suffix), &output.reference_events)
        .map_err(write_err)?;
    if let Some(events) = &output.evaluation_events {
        store
            .write_enriched(&mpbp_table(&format!("{suffix}_eval")), events)
            .map_err(write_err)?;
    }
    if !output.report.occurrences_reused {
        store
            .write_occurrences(&suffix, &output.occurrences)
            .map_err(write_err)?;
    }
    store
        .write_rewards(&suffix, &output.rewards)
        .map_err(write_err)?;
    for table in &output.tables {
        store
            .write_metric_table(&suffix, table)
            .map_err(write_err)?;
    }
    info!(
        partition = %label,
        suffix = %suffix,
        elapsed_ms = output.report.elapsed_ms,
        "partition written"
    );
    Ok(output.report)
}

/// Write run reports as JSON next to each other, replacing the file atomically.
pub fn write_report(path: &Path, reports: &[RunReport]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let json = serde_json::to_string_pretty(reports).context("serialize run report")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename report into {}", path.display()))?;
    Ok(())
}
