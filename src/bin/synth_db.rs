use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use gpiv::store::Store;
use gpiv::synthetic::{SyntheticConfig, generate};

/// Write a seeded synthetic play-by-play corpus into a database
#[derive(Parser, Debug)]
#[command(name = "synth_db", about)]
struct Args {
    #[arg(long, default_value = "gpiv_synthetic.sqlite")]
    db: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    games: Option<usize>,

    #[arg(long)]
    teams: Option<u32>,

    /// Season start year; games begin on October 1st
    #[arg(long)]
    season: Option<i32>,

    #[arg(long)]
    games_per_day: Option<usize>,

    #[arg(long, default_value = "false")]
    playoffs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = SyntheticConfig::default();
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(games) = args.games {
        cfg.games = games;
    }
    if let Some(teams) = args.teams {
        cfg.teams = teams;
    }
    if let Some(season) = args.season {
        cfg.season = season;
        cfg.start_date = NaiveDate::from_ymd_opt(season, 10, 1).unwrap_or(cfg.start_date);
    }
    if let Some(per_day) = args.games_per_day {
        cfg.games_per_day = per_day;
    }
    cfg.playoffs = args.playoffs;

    let corpus = generate(&cfg);
    let mut store = Store::open(&args.db)?;
    corpus
        .load_into(&mut store)
        .with_context(|| format!("load synthetic corpus into {}", args.db.display()))?;

    println!("Synthetic corpus written");
    println!("DB: {}", args.db.display());
    println!("Games: {}", corpus.dates.len());
    println!("Events: {}", corpus.events.len());
    println!("Goals: {}", corpus.goals.len());
    println!("Players: {}", corpus.players.len());
    Ok(())
}
