use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::evaluation::Correlation;
use crate::model::Position;
use crate::weighted::{MetricKind, MetricTable, round3};

pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
    pub skipped_by_position: usize,
}

enum Cell {
    Text(String),
    Int(i64),
    Num(f64),
    Empty,
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::Text((*n).to_string())).collect()
}

/// Excel sheet names: at most 31 chars and none of `[]:*?/\`.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim_start_matches('_')
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

fn ranking_rows(
    table: &MetricTable,
    positions: Option<&[Position]>,
    skipped: &mut usize,
) -> Vec<Vec<Cell>> {
    let weighted_title = format!("Weighted {}", table.kind.title());
    let mut rows = vec![header(&[
        "Rank",
        "Player ID",
        "Player",
        "Position",
        table.kind.title(),
        weighted_title.as_str(),
        "Rank (Traditional)",
        "Rank Diff",
    ])];
    for r in &table.records {
        if positions.is_some_and(|allowed| !allowed.contains(&r.position)) {
            *skipped += 1;
            continue;
        }
        rows.push(vec![
            Cell::Int(i64::from(r.rank_weighted)),
            Cell::Int(i64::from(r.player_id)),
            Cell::Text(r.name.clone()),
            Cell::Text(r.position.as_str().to_string()),
            Cell::Int(r.traditional),
            Cell::Num(round3(r.weighted)),
            Cell::Int(i64::from(r.rank_traditional)),
            Cell::Int(r.rank_diff),
        ]);
    }
    rows
}

/// One workbook for `kind` with a sheet per run (suffix, table).
pub fn write_ranking_workbook(
    path: &Path,
    kind: MetricKind,
    runs: &[(String, MetricTable)],
    positions: Option<&[Position]>,
) -> Result<ExportReport> {
    let decimal = Format::new().set_num_format("#,##0.000");
    let mut workbook = Workbook::new();
    let mut report = ExportReport {
        sheets: 0,
        rows: 0,
        skipped_by_position: 0,
    };
    for (suffix, table) in runs {
        if table.kind != kind {
            continue;
        }
        let rows = ranking_rows(table, positions, &mut report.skipped_by_position);
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(suffix))?;
        write_cells(sheet, &rows, &decimal)?;
        report.sheets += 1;
        report.rows += rows.len().saturating_sub(1);
    }
    if report.sheets == 0 {
        let sheet = workbook.add_worksheet();
        sheet.set_name(kind.title())?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(report)
}

pub fn write_correlation_workbook(path: &Path, results: &[(String, Correlation)]) -> Result<()> {
    let decimal = Format::new().set_num_format("0.000");
    let mut rows = vec![header(&["Run", "Metric", "Mode", "Samples", "Pearson", "Spearman"])];
    for (run, c) in results {
        let num = |v: Option<f64>| v.map(Cell::Num).unwrap_or(Cell::Empty);
        rows.push(vec![
            Cell::Text(run.clone()),
            Cell::Text(c.metric.title().to_string()),
            Cell::Text(c.mode.label()),
            Cell::Int(c.samples as i64),
            num(c.pearson),
            num(c.spearman),
        ]);
    }
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Correlations")?;
        write_cells(sheet, &rows, &decimal)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_cells(worksheet: &mut Worksheet, rows: &[Vec<Cell>], decimal: &Format) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        let r = row_idx as u32;
        for (col_idx, value) in row.iter().enumerate() {
            let c = col_idx as u16;
            let written = match value {
                Cell::Text(s) => worksheet.write_string(r, c, s).map(|_| ()),
                Cell::Int(v) => worksheet.write_number(r, c, *v as f64).map(|_| ()),
                Cell::Num(v) => worksheet
                    .write_number_with_format(r, c, *v, decimal)
                    .map(|_| ()),
                Cell::Empty => Ok(()),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_excel_safe() {
        assert_eq!(sheet_name("_2013_partition_4_part1"), "2013_partition_4_part1");
        assert_eq!(sheet_name("a/b"), "a_b");
        assert_eq!(sheet_name(""), "Sheet");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}
