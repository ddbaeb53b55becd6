use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::PartitionError;
use crate::model::{GAME_TYPE_PLAYOFFS, GAME_TYPE_REGULAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub index: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub games: usize,
}

/// Split a season into `count` contiguous date segments of roughly equal game count.
///
/// `per_date` holds the number of distinct games played on each date. The k-th
/// boundary is the date whose cumulative game count is nearest to
/// `k * total / count`; on ties the earliest date wins. Segment k starts the day
/// after segment k-1 ends, the first segment starts on the first game date and
/// the last one ends on the last game date.
pub fn partition_dates(
    season: i32,
    per_date: &[(NaiveDate, usize)],
    count: u32,
) -> Result<Vec<Segment>, PartitionError> {
    if count == 0 {
        return Err(PartitionError::ZeroPartitions);
    }
    let mut dates: Vec<(NaiveDate, usize)> =
        per_date.iter().copied().filter(|(_, n)| *n > 0).collect();
    dates.sort_by_key(|(date, _)| *date);
    let total: usize = dates.iter().map(|(_, n)| n).sum();
    if dates.is_empty() || total == 0 {
        return Err(PartitionError::EmptySeason { season });
    }
    if count as usize > dates.len() {
        return Err(PartitionError::TooManyPartitions {
            season,
            count,
            dates: dates.len(),
        });
    }

    let mut cumulative = Vec::with_capacity(dates.len());
    let mut running = 0usize;
    for (_, n) in &dates {
        running += n;
        cumulative.push(running);
    }

    let mut segments = Vec::with_capacity(count as usize);
    let mut start = dates[0].0;
    let mut games_before = 0usize;
    for index in 1..=count {
        let target = total as f64 * index as f64 / count as f64;
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (pos, cum) in cumulative.iter().enumerate() {
            let dist = (*cum as f64 - target).abs();
            if dist < best_dist {
                best = pos;
                best_dist = dist;
            }
        }
        let end = dates[best].0;
        let games = cumulative[best].saturating_sub(games_before);
        if end < start || games == 0 {
            return Err(PartitionError::EmptySegment {
                season,
                count,
                index,
            });
        }
        segments.push(Segment {
            index,
            start,
            end,
            games,
        });
        games_before = cumulative[best];
        start = end
            .checked_add_days(Days::new(1))
            .ok_or(PartitionError::EmptySegment {
                season,
                count,
                index,
            })?;
    }
    Ok(segments)
}

pub trait DateCatalog {
    fn games_per_date(&self, season: i32, game_type: u32) -> anyhow::Result<Vec<(NaiveDate, usize)>>;
}

/// Which games a corpus covers. All bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusQuery {
    pub seasons: Option<(i32, i32)>,
    pub game_type: u32,
    pub dates: Option<(NaiveDate, NaiveDate)>,
}

impl CorpusQuery {
    pub fn season(season: i32, game_type: u32) -> Self {
        Self {
            seasons: Some((season, season)),
            game_type,
            dates: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PartitionSelector {
    FullSeason {
        season: i32,
    },
    Playoffs {
        season: i32,
    },
    MultiSeason {
        first_season: i32,
        evaluation_season: i32,
        playoffs: bool,
    },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
        evaluation_start: Option<NaiveDate>,
        playoffs: bool,
    },
    IndexedPartition {
        season: i32,
        count: u32,
        index: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPartition {
    pub label: String,
    pub suffix: String,
    pub reference: CorpusQuery,
    /// Separate goal corpus; `None` means goals come from `reference`.
    pub evaluation: Option<CorpusQuery>,
    pub segment: Option<Segment>,
}

fn game_type(playoffs: bool) -> u32 {
    if playoffs {
        GAME_TYPE_PLAYOFFS
    } else {
        GAME_TYPE_REGULAR
    }
}

pub fn sanitize_suffix(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('_') {
        cleaned
    } else {
        format!("_{cleaned}")
    }
}

impl PartitionSelector {
    pub fn label(&self) -> String {
        match self {
            PartitionSelector::FullSeason { season } => season.to_string(),
            PartitionSelector::Playoffs { season } => format!("{season}_playoffs"),
            PartitionSelector::MultiSeason {
                first_season,
                evaluation_season,
                playoffs,
            } => {
                let base = format!("{first_season}_{evaluation_season}_eval");
                if *playoffs {
                    format!("{base}_playoffs")
                } else {
                    base
                }
            }
            PartitionSelector::DateRange {
                start,
                end,
                evaluation_start,
                playoffs,
            } => {
                let mut base = format!("{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d"));
                if let Some(split) = evaluation_start {
                    base.push_str(&format!("_eval{}", split.format("%Y%m%d")));
                }
                if *playoffs {
                    base.push_str("_playoffs");
                }
                base
            }
            PartitionSelector::IndexedPartition {
                season,
                count,
                index,
            } => format!("{season}_partition_{count}_part{index}"),
        }
    }

    pub fn resolve(&self, catalog: &impl DateCatalog) -> anyhow::Result<ResolvedPartition> {
        let label = self.label();
        let suffix = sanitize_suffix(&label);
        let resolved = match self {
            PartitionSelector::FullSeason { season } => ResolvedPartition {
                label,
                suffix,
                reference: CorpusQuery::season(*season, GAME_TYPE_REGULAR),
                evaluation: None,
                segment: None,
            },
            PartitionSelector::Playoffs { season } => ResolvedPartition {
                label,
                suffix,
                reference: CorpusQuery::season(*season, GAME_TYPE_PLAYOFFS),
                evaluation: None,
                segment: None,
            },
            PartitionSelector::MultiSeason {
                first_season,
                evaluation_season,
                playoffs,
            } => {
                if evaluation_season <= first_season {
                    anyhow::bail!(
                        "evaluation season {evaluation_season} must come after {first_season}"
                    );
                }
                ResolvedPartition {
                    label,
                    suffix,
                    reference: CorpusQuery {
                        seasons: Some((*first_season, evaluation_season - 1)),
                        game_type: game_type(*playoffs),
                        dates: None,
                    },
                    evaluation: Some(CorpusQuery::season(*evaluation_season, game_type(*playoffs))),
                    segment: None,
                }
            }
            PartitionSelector::DateRange {
                start,
                end,
                evaluation_start,
                playoffs,
            } => {
                if start > end {
                    anyhow::bail!("date range starts {start} after it ends {end}");
                }
                match evaluation_start {
                    Some(split) => {
                        if split <= start || split > end {
                            anyhow::bail!("evaluation start {split} must lie in ({start}, {end}]");
                        }
                        let reference_end = split
                            .checked_sub_days(Days::new(1))
                            .ok_or_else(|| anyhow::anyhow!("date underflow before {split}"))?;
                        ResolvedPartition {
                            label,
                            suffix,
                            reference: CorpusQuery {
                                seasons: None,
                                game_type: game_type(*playoffs),
                                dates: Some((*start, reference_end)),
                            },
                            evaluation: Some(CorpusQuery {
                                seasons: None,
                                game_type: game_type(*playoffs),
                                dates: Some((*split, *end)),
                            }),
                            segment: None,
                        }
                    }
                    None => ResolvedPartition {
                        label,
                        suffix,
                        reference: CorpusQuery {
                            seasons: None,
                            game_type: game_type(*playoffs),
                            dates: Some((*start, *end)),
                        },
                        evaluation: None,
                        segment: None,
                    },
                }
            }
            PartitionSelector::IndexedPartition {
                season,
                count,
                index,
            } => {
                if *index == 0 || index > count {
                    return Err(PartitionError::IndexOutOfRange {
                        index: *index,
                        count: *count,
                    }
                    .into());
                }
                let per_date = catalog.games_per_date(*season, GAME_TYPE_REGULAR)?;
                let segments = partition_dates(*season, &per_date, *count)?;
                let segment = segments[(*index - 1) as usize];
                ResolvedPartition {
                    label,
                    suffix,
                    reference: CorpusQuery {
                        seasons: Some((*season, *season)),
                        game_type: GAME_TYPE_REGULAR,
                        dates: Some((segment.start, segment.end)),
                    },
                    evaluation: None,
                    segment: Some(segment),
                }
            }
        };
        Ok(resolved)
    }
}
