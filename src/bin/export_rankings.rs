use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gpiv::export::write_ranking_workbook;
use gpiv::model::Position;
use gpiv::store::Store;
use gpiv::weighted::{MetricKind, MetricTable};

/// Write one ranking workbook per metric
#[derive(Parser, Debug)]
#[command(name = "export_rankings", about)]
struct Args {
    #[arg(long, env = "GPIV_DB")]
    db: PathBuf,

    /// One sheet per suffix
    #[arg(long, value_delimiter = ',', required = true)]
    suffixes: Vec<String>,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Keep only players at these positions
    #[arg(long, value_delimiter = ',')]
    positions: Vec<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    let args = Args::parse();

    let mut positions = Vec::new();
    for token in args.positions.iter().filter(|t| !t.trim().is_empty()) {
        let pos = Position::parse(token).with_context(|| format!("unknown position `{token}`"))?;
        positions.push(pos);
    }
    let positions = (!positions.is_empty()).then_some(positions);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create {}", args.out_dir.display()))?;
    let store = Store::open(&args.db)?;

    for kind in MetricKind::ALL {
        let mut runs: Vec<(String, MetricTable)> = Vec::new();
        for suffix in args.suffixes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            match store.load_metric_table(kind, suffix)? {
                Some(table) => runs.push((suffix.to_string(), table)),
                None => eprintln!("missing table {}", kind.table_name(suffix)),
            }
        }
        if runs.is_empty() {
            continue;
        }
        let path = args.out_dir.join(format!("weighted_{}.xlsx", kind.stem()));
        let report = write_ranking_workbook(&path, kind, &runs, positions.as_deref())?;
        println!(
            "{}: {} sheet(s), {} rows, {} filtered by position -> {}",
            kind.title(),
            report.sheets,
            report.rows,
            report.skipped_by_position,
            path.display()
        );
    }
    Ok(())
}
