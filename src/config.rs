use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::error::ConfigError;
use crate::model::{GAME_TYPE_PLAYOFFS, GameId, Position, game_type_of};
use crate::partition::PartitionSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RinkRules {
    pub period_seconds: u32,
    pub regulation_periods: u8,
    /// Shootout period for regular-season games. Playoff games never have one.
    pub shootout_period: Option<u8>,
}

impl Default for RinkRules {
    fn default() -> Self {
        Self {
            period_seconds: 1200,
            regulation_periods: 3,
            shootout_period: Some(5),
        }
    }
}

impl RinkRules {
    pub fn elapsed_seconds(&self, period: u8, clock_seconds: u32) -> u32 {
        self.period_seconds * u32::from(period.saturating_sub(1)) + clock_seconds
    }

    pub fn shootout_period_for(&self, game_id: GameId) -> Option<u8> {
        if game_type_of(game_id) == GAME_TYPE_PLAYOFFS {
            None
        } else {
            self.shootout_period
        }
    }

    pub fn is_regulation(&self, period: u8) -> bool {
        period <= self.regulation_periods
    }
}

/// Goal-impact weighting pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "gpiv", version, about)]
pub struct RunConfig {
    /// SQLite database path
    #[arg(long, env = "GPIV_DB", default_value = "gpiv.sqlite")]
    pub db: PathBuf,

    /// Season start year (e.g. 2013 for 2013-14)
    #[arg(long, env = "GPIV_SEASON")]
    pub season: Option<i32>,

    /// First game date of an explicit range (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last game date of an explicit range (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Split an explicit date range: goals are evaluated from this date on
    #[arg(long)]
    pub evaluation_start_date: Option<NaiveDate>,

    /// Use playoff games instead of the regular season
    #[arg(long, env = "GPIV_PLAYOFFS", default_value = "false")]
    pub playoffs: bool,

    /// Evaluate goals of this season against all seasons from --season before it
    #[arg(long)]
    pub evaluation_season: Option<i32>,

    /// Number of chronological partitions of the regular season
    #[arg(long)]
    pub partition_count: Option<u32>,

    /// 1-based partition to run; all partitions run when omitted
    #[arg(long)]
    pub partition_index: Option<u32>,

    /// Only credit goals whose scorer plays one of these positions (e.g. C,L,R)
    #[arg(long, value_delimiter = ',')]
    pub positions: Vec<String>,

    /// Override the output table suffix
    #[arg(long)]
    pub suffix: Option<String>,

    /// Abort when more than this fraction of goals lacks a goal record
    #[arg(long, env = "GPIV_MAX_MISSING_GOAL_FRACTION", default_value = "0.05")]
    pub max_missing_goal_fraction: f64,

    /// Reuse a stored occurrence table instead of recounting
    #[arg(long, default_value = "false")]
    pub skip_occurrences: bool,

    /// Suffix of the run whose occurrence table is reused (defaults to the output suffix)
    #[arg(long, requires = "skip_occurrences")]
    pub occurrences_suffix: Option<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            db: PathBuf::from("gpiv.sqlite"),
            season: None,
            start_date: None,
            end_date: None,
            evaluation_start_date: None,
            playoffs: false,
            evaluation_season: None,
            partition_count: None,
            partition_index: None,
            positions: Vec::new(),
            suffix: None,
            max_missing_goal_fraction: 0.05,
            skip_occurrences: false,
            occurrences_suffix: None,
            report: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_dates = self.start_date.is_some() || self.end_date.is_some();

        if self.partition_count.is_some() {
            if self.evaluation_season.is_some() {
                return Err(ConfigError::Conflict {
                    first: "partition-count",
                    second: "evaluation-season",
                });
            }
            if has_dates {
                return Err(ConfigError::Conflict {
                    first: "partition-count",
                    second: "start-date/end-date",
                });
            }
            if self.playoffs {
                return Err(ConfigError::Conflict {
                    first: "partition-count",
                    second: "playoffs",
                });
            }
        }
        if has_dates && self.evaluation_season.is_some() {
            return Err(ConfigError::Conflict {
                first: "start-date/end-date",
                second: "evaluation-season",
            });
        }
        if self.evaluation_start_date.is_some() && !has_dates {
            return Err(ConfigError::Invalid {
                field: "evaluation-start-date",
                message: "requires --start-date and --end-date".to_string(),
            });
        }

        match (self.partition_count, self.partition_index) {
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    field: "partition-index",
                    message: "requires --partition-count".to_string(),
                });
            }
            (Some(0), _) => {
                return Err(ConfigError::Invalid {
                    field: "partition-count",
                    message: "must be at least 1".to_string(),
                });
            }
            (Some(count), Some(index)) if index == 0 || index > count => {
                return Err(ConfigError::Invalid {
                    field: "partition-index",
                    message: format!("{index} is outside 1..={count}"),
                });
            }
            _ => {}
        }

        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(ConfigError::Invalid {
                        field: "start-date",
                        message: format!("{start} is after end date {end}"),
                    });
                }
                if let Some(split) = self.evaluation_start_date
                    && (split <= start || split > end)
                {
                    return Err(ConfigError::Invalid {
                        field: "evaluation-start-date",
                        message: format!("{split} must lie after {start} and not after {end}"),
                    });
                }
            }
            (Some(_), None) => {
                return Err(ConfigError::Invalid {
                    field: "end-date",
                    message: "required together with --start-date".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    field: "start-date",
                    message: "required together with --end-date".to_string(),
                });
            }
            (None, None) => {
                if self.season.is_none() {
                    return Err(ConfigError::Invalid {
                        field: "season",
                        message: "required unless a date range is given".to_string(),
                    });
                }
            }
        }

        if let (Some(season), Some(eval)) = (self.season, self.evaluation_season)
            && eval <= season
        {
            return Err(ConfigError::Invalid {
                field: "evaluation-season",
                message: format!("{eval} must come after season {season}"),
            });
        }

        if !(0.0..=1.0).contains(&self.max_missing_goal_fraction) {
            return Err(ConfigError::Invalid {
                field: "max-missing-goal-fraction",
                message: format!("{} is not within [0, 1]", self.max_missing_goal_fraction),
            });
        }

        if self.occurrences_suffix.is_some() && !self.skip_occurrences {
            return Err(ConfigError::Invalid {
                field: "occurrences-suffix",
                message: "requires --skip-occurrences".to_string(),
            });
        }

        self.position_filter()?;
        Ok(())
    }

    pub fn position_filter(&self) -> Result<Option<Vec<Position>>, ConfigError> {
        if self.positions.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::new();
        for raw in &self.positions {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Position::parse(trimmed) {
                Some(pos) if pos.is_skater() => {
                    if !out.contains(&pos) {
                        out.push(pos);
                    }
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        field: "positions",
                        message: format!("unknown skater position `{trimmed}` (expected C, D, L or R)"),
                    });
                }
            }
        }
        out.sort();
        Ok(if out.is_empty() { None } else { Some(out) })
    }

    pub fn selectors(&self) -> Result<Vec<PartitionSelector>, ConfigError> {
        self.validate()?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            return Ok(vec![PartitionSelector::DateRange {
                start,
                end,
                evaluation_start: self.evaluation_start_date,
                playoffs: self.playoffs,
            }]);
        }

        let season = self.season.ok_or(ConfigError::Invalid {
            field: "season",
            message: "required unless a date range is given".to_string(),
        })?;

        if let Some(count) = self.partition_count {
            let indices: Vec<u32> = match self.partition_index {
                Some(index) => vec![index],
                None => (1..=count).collect(),
            };
            return Ok(indices
                .into_iter()
                .map(|index| PartitionSelector::IndexedPartition {
                    season,
                    count,
                    index,
                })
                .collect());
        }

        if let Some(evaluation_season) = self.evaluation_season {
            return Ok(vec![PartitionSelector::MultiSeason {
                first_season: season,
                evaluation_season,
                playoffs: self.playoffs,
            }]);
        }

        if self.playoffs {
            Ok(vec![PartitionSelector::Playoffs { season }])
        } else {
            Ok(vec![PartitionSelector::FullSeason { season }])
        }
    }
}
