use std::collections::HashMap;

use serde::Serialize;

use crate::model::PlayerId;
use crate::weighted::{MetricKind, MetricTable};

/// Which two value columns a correlation compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonMode {
    /// Traditional against weighted value within one table.
    TraditionalVsWeighted,
    /// Full-season weighted value against `partitions ×` the partition's
    /// weighted value.
    GeneralizedWeighted { partitions: u32 },
    /// Same as `GeneralizedWeighted` for the traditional value.
    GeneralizedTraditional { partitions: u32 },
}

impl ComparisonMode {
    pub fn label(&self) -> String {
        match self {
            ComparisonMode::TraditionalVsWeighted => "traditional-vs-weighted".to_string(),
            ComparisonMode::GeneralizedWeighted { partitions } => {
                format!("generalized-weighted-x{partitions}")
            }
            ComparisonMode::GeneralizedTraditional { partitions } => {
                format!("generalized-traditional-x{partitions}")
            }
        }
    }

    pub fn needs_partition(&self) -> bool {
        !matches!(self, ComparisonMode::TraditionalVsWeighted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    pub metric: MetricKind,
    pub mode: ComparisonMode,
    pub samples: usize,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0_f64;
    let mut var_x = 0.0_f64;
    let mut var_y = 0.0_f64;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Ranks starting at 1, tied values sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

/// Paired values for a comparison. Players missing from the partition table
/// count as zero.
pub fn paired_values(
    mode: ComparisonMode,
    full: &MetricTable,
    partition: Option<&MetricTable>,
) -> (Vec<f64>, Vec<f64>) {
    match mode {
        ComparisonMode::TraditionalVsWeighted => full
            .records
            .iter()
            .map(|r| (r.traditional as f64, r.weighted))
            .unzip(),
        ComparisonMode::GeneralizedWeighted { partitions }
        | ComparisonMode::GeneralizedTraditional { partitions } => {
            let weighted = matches!(mode, ComparisonMode::GeneralizedWeighted { .. });
            let value = |traditional: i64, w: f64| if weighted { w } else { traditional as f64 };
            let part: HashMap<PlayerId, f64> = partition
                .map(|t| {
                    t.records
                        .iter()
                        .map(|r| (r.player_id, value(r.traditional, r.weighted)))
                        .collect()
                })
                .unwrap_or_default();
            full.records
                .iter()
                .map(|r| {
                    let scaled = part.get(&r.player_id).copied().unwrap_or(0.0) * partitions as f64;
                    (value(r.traditional, r.weighted), scaled)
                })
                .unzip()
        }
    }
}

pub fn correlate(
    mode: ComparisonMode,
    full: &MetricTable,
    partition: Option<&MetricTable>,
) -> Correlation {
    let (xs, ys) = paired_values(mode, full, partition);
    Correlation {
        metric: full.kind,
        mode,
        samples: xs.len(),
        pearson: pearson(&xs, &ys),
        spearman: spearman(&xs, &ys),
    }
}
