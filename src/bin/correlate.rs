use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use gpiv::evaluation::{ComparisonMode, Correlation, correlate};
use gpiv::export::write_correlation_workbook;
use gpiv::store::Store;
use gpiv::weighted::MetricKind;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    #[value(alias = "traditional")]
    TraditionalVsWeighted,
    GeneralizedWeighted,
    GeneralizedTraditional,
}

/// Correlate stored weighted tables
// correlate --suffix _2013 --partition-suffix _2013_partition_4_part1 \
//     --partitions 4 --mode generalized-weighted --out corr.xlsx
#[derive(Parser, Debug)]
#[command(name = "correlate", about)]
struct Args {
    #[arg(long, env = "GPIV_DB")]
    db: PathBuf,

    /// Full-run suffixes to correlate
    #[arg(long, value_delimiter = ',', required = true)]
    suffix: Vec<String>,

    #[arg(long, value_enum, default_value = "traditional-vs-weighted")]
    mode: Mode,

    /// Partition run compared against each full run in the generalized modes
    #[arg(long)]
    partition_suffix: Option<String>,

    #[arg(long, default_value = "1")]
    partitions: u32,

    /// Metric stems (goals, assists, first_assists, points, plus_minus); all when omitted
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Also write the results to this workbook
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mode = match args.mode {
        Mode::TraditionalVsWeighted => ComparisonMode::TraditionalVsWeighted,
        Mode::GeneralizedWeighted => ComparisonMode::GeneralizedWeighted {
            partitions: args.partitions,
        },
        Mode::GeneralizedTraditional => ComparisonMode::GeneralizedTraditional {
            partitions: args.partitions,
        },
    };
    if mode.needs_partition() && args.partition_suffix.is_none() {
        bail!("--mode {} needs --partition-suffix", mode.label());
    }
    let metrics = if args.metrics.is_empty() {
        MetricKind::ALL.to_vec()
    } else {
        args.metrics
            .iter()
            .map(|m| MetricKind::parse(m).with_context(|| format!("unknown metric `{m}`")))
            .collect::<Result<Vec<_>>>()?
    };

    let store = Store::open(&args.db)?;
    let mut results: Vec<(String, Correlation)> = Vec::new();
    for suffix in args.suffix.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        for kind in &metrics {
            let Some(full) = store.load_metric_table(*kind, suffix)? else {
                eprintln!("missing table {}", kind.table_name(suffix));
                continue;
            };
            let partition = match &args.partition_suffix {
                Some(part) => store.load_metric_table(*kind, part)?,
                None => None,
            };
            if mode.needs_partition() && partition.is_none() {
                eprintln!(
                    "missing table {}",
                    kind.table_name(args.partition_suffix.as_deref().unwrap_or_default())
                );
                continue;
            }
            results.push((suffix.to_string(), correlate(mode, &full, partition.as_ref())));
        }
    }

    println!("{:<14} {:<14} {:>7} {:>9} {:>9}", "run", "metric", "n", "pearson", "spearman");
    for (run, c) in &results {
        println!(
            "{:<14} {:<14} {:>7} {:>9} {:>9}",
            run,
            c.metric.stem(),
            c.samples,
            fmt_opt(c.pearson),
            fmt_opt(c.spearman)
        );
    }

    if let Some(path) = &args.out {
        write_correlation_workbook(path, &results)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| "-".to_string())
}
