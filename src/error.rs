use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::GameId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{first}` cannot be combined with `{second}`")]
    Conflict {
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid value for `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("partition count must be at least 1")]
    ZeroPartitions,

    #[error("no regular-season games found for season {season}")]
    EmptySeason { season: i32 },

    #[error("{count} partitions requested but season {season} has only {dates} game dates")]
    TooManyPartitions { season: i32, count: u32, dates: usize },

    #[error("partition index {index} is outside 1..={count}")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("partition {index} of {count} for season {season} contains no games")]
    EmptySegment { season: i32, count: u32, index: u32 },
}

/// Pipeline stage, used to tag failures so a single partition can be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Resolve,
    Load,
    Reconstruct,
    CountOccurrences,
    Reward,
    Write,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Load => "load",
            Stage::Reconstruct => "reconstruct",
            Stage::CountOccurrences => "count-occurrences",
            Stage::Reward => "reward",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("partition `{partition}` failed at stage {stage}{}: {source}", game_note(.game_id))]
pub struct PipelineError {
    pub partition: String,
    pub stage: Stage,
    pub game_id: Option<GameId>,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

fn game_note(game_id: &Option<GameId>) -> String {
    match game_id {
        Some(id) => format!(" (game {id})"),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn new(
        partition: impl Into<String>,
        stage: Stage,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            partition: partition.into(),
            stage,
            game_id: None,
            source: source.into(),
        }
    }

    pub fn with_game(mut self, game_id: GameId) -> Self {
        self.game_id = Some(game_id);
        self
    }
}

/// Why a game or goal was left out of a run. These are counted and logged,
/// never fatal on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExclusionReason {
    MissingOutcome,
    TiedFinalScore,
    CorruptOvertime,
    MissingGoalDetail,
}

impl ExclusionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionReason::MissingOutcome => "missing-outcome",
            ExclusionReason::TiedFinalScore => "tied-final-score",
            ExclusionReason::CorruptOvertime => "corrupt-overtime",
            ExclusionReason::MissingGoalDetail => "missing-goal-detail",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub game_id: GameId,
    pub event_number: Option<u32>,
    pub reason: ExclusionReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_names_partition_stage_and_game() {
        let err = PipelineError::new("2013_partition_4_part2", Stage::Reconstruct, "boom")
            .with_game(2013020001);
        let msg = err.to_string();
        assert!(msg.contains("2013_partition_4_part2"));
        assert!(msg.contains("reconstruct"));
        assert!(msg.contains("game 2013020001"));
    }

    #[test]
    fn conflict_names_both_options() {
        let err = ConfigError::Conflict {
            first: "partition-count",
            second: "evaluation-season",
        };
        let msg = err.to_string();
        assert!(msg.contains("partition-count") && msg.contains("evaluation-season"));
    }
}
