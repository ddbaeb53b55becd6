use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gpiv::model::GAME_TYPE_REGULAR;
use gpiv::partition::{DateCatalog, partition_dates};
use gpiv::store::Store;

/// Print the chronological partition boundaries of a season
#[derive(Parser, Debug)]
#[command(name = "partition_plan", about)]
struct Args {
    #[arg(long, env = "GPIV_DB")]
    db: PathBuf,

    #[arg(long, env = "GPIV_SEASON")]
    season: i32,

    /// Show plans for 1..=N partitions
    #[arg(long, default_value = "4")]
    max_partitions: u32,

    #[arg(long, default_value = "false")]
    json: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    let args = Args::parse();
    let season = args.season;

    let store = Store::open(&args.db)?;
    let per_date = store.games_per_date(season, GAME_TYPE_REGULAR)?;
    let total: usize = per_date.iter().map(|(_, n)| n).sum();

    let mut plans = Vec::new();
    for count in 1..=args.max_partitions.max(1) {
        match partition_dates(season, &per_date, count) {
            Ok(segments) => plans.push((count, segments)),
            Err(err) => {
                eprintln!("{count} partitions: {err}");
                break;
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&plans).context("serialize partition plan")?;
        println!("{json}");
        return Ok(());
    }

    println!("Season {season}: {total} regular-season games on {} dates", per_date.len());
    for (count, segments) in &plans {
        println!("{count} partition(s):");
        for seg in segments {
            println!(
                "  part{:<2} {} .. {}  {:>5} games",
                seg.index, seg.start, seg.end, seg.games
            );
        }
    }
    Ok(())
}
