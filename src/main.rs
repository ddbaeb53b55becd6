use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use gpiv::config::RunConfig;
use gpiv::pipeline::{RunOptions, RunReport, run_partition, write_report};
use gpiv::store::Store;

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RunConfig::parse();
    match run(&config) {
        Ok(reports) => {
            for report in &reports {
                print_report(report);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &RunConfig) -> anyhow::Result<Vec<RunReport>> {
    // option conflicts are rejected before the database is touched
    let selectors = config.selectors()?;
    let mut opts = RunOptions::from_config(config)?;

    let mut store = Store::open(&config.db)?;
    info!(db = %config.db.display(), runs = selectors.len(), "opened store");

    let mut reports = Vec::with_capacity(selectors.len());
    for selector in &selectors {
        if selectors.len() > 1 && let Some(base) = &config.suffix {
            opts.suffix_override = Some(format!("{base}_{}", selector.label()));
        }
        if selectors.len() > 1 && let Some(base) = &config.occurrences_suffix {
            opts.occurrences_suffix = Some(format!("{base}_{}", selector.label()));
        }
        let report = run_partition(&mut store, selector, &opts)?;
        reports.push(report);
    }

    if let Some(path) = &config.report {
        write_report(path, &reports)?;
        info!(path = %path.display(), "wrote run report");
    }
    Ok(reports)
}

fn print_report(report: &RunReport) {
    println!("Partition: {} (suffix `{}`)", report.label, report.suffix);
    println!(
        "  games: {} in, {} kept ({} missing outcome, {} tied, {} corrupt)",
        report.reference.games_in,
        report.reference.games_kept,
        report.reference.games_missing_outcome,
        report.reference.games_tied,
        report.reference.games_corrupt
    );
    if let Some(eval) = &report.evaluation {
        println!(
            "  evaluation games: {} in, {} kept",
            eval.games_in, eval.games_kept
        );
    }
    println!(
        "  goals: {} counted{}, {} rewarded, {} credited",
        report.goals_counted,
        if report.occurrences_reused {
            " (reused)"
        } else {
            ""
        },
        report.reward.goals_out,
        report.aggregate.goals_credited
    );
    for (metric, players) in &report.metric_players {
        println!("  {metric}: {players} players");
    }
    println!("  elapsed: {} ms", report.elapsed_ms);
}
