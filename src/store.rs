use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Statement, params};

use crate::model::{
    EnrichedEvent, EventType, GameId, GameState, GoalDetail, OutcomeTally, Player, PlayerId,
    Position, RawEvent, Side, game_id_bounds,
};
use crate::occurrence::OccurrenceRow;
use crate::partition::{CorpusQuery, DateCatalog};
use crate::reconstruct::parse_clock;
use crate::reward::RewardRow;
use crate::weighted::{MetricKind, MetricRecord, MetricTable, round3};

pub const MAX_ON_ICE: usize = 9;

/// SQLite-backed tabular store for inputs and per-run output tables.
pub struct Store {
    conn: Connection,
}

pub fn mpbp_table(suffix: &str) -> String {
    format!("mpbp{suffix}")
}

pub fn occurrences_table(suffix: &str) -> String {
    format!("occurrences{suffix}")
}

pub fn reward_table(suffix: &str) -> String {
    format!("reward{suffix}")
}

fn check_table_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow!("refusing unsafe table name `{name}`"));
    }
    Ok(())
}

fn player_columns(prefix: &str) -> Vec<String> {
    (1..=MAX_ON_ICE).map(|i| format!("{prefix}_player_{i}")).collect()
}

fn corpus_bounds(query: &CorpusQuery) -> (i64, i64) {
    match query.seasons {
        Some((first, last)) => {
            let (lo, _) = game_id_bounds(first, 0);
            let (hi, _) = game_id_bounds(last + 1, 0);
            (lo as i64, hi as i64 - 1)
        }
        None => (0, i64::MAX),
    }
}

fn date_bounds(query: &CorpusQuery) -> (Option<String>, Option<String>) {
    match query.dates {
        Some((start, end)) => (Some(start.to_string()), Some(end.to_string())),
        None => (None, None),
    }
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("look up table {name}"))?;
        Ok(found.is_some())
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        check_table_name(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .with_context(|| format!("count rows of {table}"))?;
        Ok(n as usize)
    }

    pub fn insert_events(&mut self, events: &[RawEvent]) -> Result<usize> {
        let home = player_columns("home");
        let away = player_columns("away");
        let mut cols = vec![
            "game_id", "event_number", "period", "event_time", "event_type", "home_team_id",
            "away_team_id", "external_event_id",
        ]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
        cols.extend(home);
        cols.extend(away);
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO play_by_play_events({}) VALUES ({})",
            cols.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction().context("begin event insert")?;
        {
            let mut stmt = tx.prepare(&sql).context("prepare event insert")?;
            for e in events {
                let clock = format!("{:02}:{:02}", e.clock_seconds / 60, e.clock_seconds % 60);
                let mut values: Vec<rusqlite::types::Value> = vec![
                    (e.game_id as i64).into(),
                    i64::from(e.event_number).into(),
                    i64::from(e.period).into(),
                    clock.into(),
                    e.event_type.as_str().to_string().into(),
                    i64::from(e.home_team_id).into(),
                    i64::from(e.away_team_id).into(),
                    e.external_event_id.map(|v| v as i64).into(),
                ];
                for side in [&e.home_on_ice, &e.away_on_ice] {
                    for slot in 0..MAX_ON_ICE {
                        values.push(side.get(slot).map(|id| i64::from(*id)).into());
                    }
                }
                stmt.execute(rusqlite::params_from_iter(values))
                    .with_context(|| format!("insert event {}/{}", e.game_id, e.event_number))?;
            }
        }
        tx.commit().context("commit event insert")?;
        Ok(events.len())
    }

    pub fn insert_goals(&mut self, goals: &[GoalDetail]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin goal insert")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO event_goal(game_id, event_number, goal_id, scoring_team_id, scorer_id, first_assist_id, second_assist_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .context("prepare goal insert")?;
            for g in goals {
                stmt.execute(params![
                    g.game_id as i64,
                    g.event_number,
                    g.goal_id.map(|v| v as i64),
                    g.scoring_team_id,
                    g.scorer_id,
                    g.first_assist_id,
                    g.second_assist_id,
                ])
                .with_context(|| format!("insert goal {}/{}", g.game_id, g.event_number))?;
            }
        }
        tx.commit().context("commit goal insert")?;
        Ok(goals.len())
    }

    pub fn insert_players(&mut self, players: &[Player]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin player insert")?;
        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO player(player_id, name, position) VALUES (?1, ?2, ?3)")
                .context("prepare player insert")?;
            for p in players {
                stmt.execute(params![p.player_id, p.name, p.position.as_str()])
                    .with_context(|| format!("insert player {}", p.player_id))?;
            }
        }
        tx.commit().context("commit player insert")?;
        Ok(players.len())
    }

    pub fn insert_game_dates(&mut self, dates: &[(GameId, NaiveDate)]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin game date insert")?;
        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO game_date(game_id, date) VALUES (?1, ?2)")
                .context("prepare game date insert")?;
            for (game_id, date) in dates {
                stmt.execute(params![*game_id as i64, date.to_string()])
                    .with_context(|| format!("insert date of game {game_id}"))?;
            }
        }
        tx.commit().context("commit game date insert")?;
        Ok(dates.len())
    }

    pub fn load_events(&self, query: &CorpusQuery) -> Result<Vec<RawEvent>> {
        let home = player_columns("e.home");
        let away = player_columns("e.away");
        let sql = format!(
            r#"
            SELECT
                e.game_id, e.event_number, e.period, e.event_time, e.event_type,
                e.home_team_id, e.away_team_id, e.external_event_id,
                {}, {}, d.date
            FROM play_by_play_events e
            LEFT JOIN game_date d ON d.game_id = e.game_id
            WHERE e.game_id BETWEEN ?1 AND ?2
              AND (e.game_id / 10000) % 100 = ?3
              AND (?4 IS NULL OR d.date >= ?4)
              AND (?5 IS NULL OR d.date <= ?5)
            ORDER BY e.game_id ASC, e.event_number ASC
            "#,
            home.join(", "),
            away.join(", ")
        );
        let (lo, hi) = corpus_bounds(query);
        let (start, end) = date_bounds(query);

        let mut stmt = self.conn.prepare(&sql).context("prepare load events query")?;
        let rows = stmt
            .query_map(params![lo, hi, query.game_type, start, end], |row| {
                let mut home_on_ice = Vec::new();
                let mut away_on_ice = Vec::new();
                for slot in 0..MAX_ON_ICE {
                    if let Some(id) = row.get::<_, Option<u32>>(8 + slot)? {
                        home_on_ice.push(id);
                    }
                    if let Some(id) = row.get::<_, Option<u32>>(8 + MAX_ON_ICE + slot)? {
                        away_on_ice.push(id);
                    }
                }
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, Option<i64>>(7)?,
                    home_on_ice,
                    away_on_ice,
                    row.get::<_, Option<String>>(8 + 2 * MAX_ON_ICE)?,
                ))
            })
            .context("query load events")?;

        let mut out = Vec::new();
        for row in rows {
            let (
                game_id,
                event_number,
                period,
                clock,
                event_type,
                home_team_id,
                away_team_id,
                external_event_id,
                home_on_ice,
                away_on_ice,
                date,
            ) = row.context("decode event row")?;
            let clock_seconds = parse_clock(&clock).ok_or_else(|| {
                anyhow!("game {game_id} event {event_number}: unreadable clock `{clock}`")
            })?;
            out.push(RawEvent {
                game_id,
                event_number,
                period,
                clock_seconds,
                event_type: EventType::parse(&event_type),
                home_team_id,
                away_team_id,
                external_event_id: external_event_id.map(|v| v as u64),
                home_on_ice,
                away_on_ice,
                game_date: parse_date(date),
            });
        }
        Ok(out)
    }

    pub fn load_goals(&self, query: &CorpusQuery) -> Result<Vec<GoalDetail>> {
        let (lo, hi) = corpus_bounds(query);
        let (start, end) = date_bounds(query);
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT g.game_id, g.event_number, g.goal_id, g.scoring_team_id,
                       g.scorer_id, g.first_assist_id, g.second_assist_id
                FROM event_goal g
                LEFT JOIN game_date d ON d.game_id = g.game_id
                WHERE g.game_id BETWEEN ?1 AND ?2
                  AND (g.game_id / 10000) % 100 = ?3
                  AND (?4 IS NULL OR d.date >= ?4)
                  AND (?5 IS NULL OR d.date <= ?5)
                ORDER BY g.game_id ASC, g.event_number ASC
                "#,
            )
            .context("prepare load goals query")?;
        let rows = stmt
            .query_map(params![lo, hi, query.game_type, start, end], |row| {
                Ok(GoalDetail {
                    game_id: row.get::<_, u64>(0)?,
                    event_number: row.get(1)?,
                    goal_id: row.get::<_, Option<i64>>(2)?.map(|v| v as u64),
                    scoring_team_id: row.get(3)?,
                    scorer_id: row.get(4)?,
                    first_assist_id: row.get(5)?,
                    second_assist_id: row.get(6)?,
                })
            })
            .context("query load goals")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode goal row")?);
        }
        Ok(out)
    }

    pub fn load_roster(&self) -> Result<HashMap<PlayerId, Player>> {
        let mut stmt = self
            .conn
            .prepare("SELECT player_id, name, position FROM player")
            .context("prepare roster query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("query roster")?;
        let mut out = HashMap::new();
        for row in rows {
            let (player_id, name, position) = row.context("decode player row")?;
            // unknown position letters are treated as non-skaters and never credited
            let position = Position::parse(&position).unwrap_or(Position::G);
            out.insert(
                player_id,
                Player {
                    player_id,
                    name,
                    position,
                },
            );
        }
        Ok(out)
    }

    /// Build `table` from scratch inside one transaction: rows go into a
    /// staging table which then replaces the old one, so readers only ever
    /// see the previous or the complete new table.
    fn replace_table<T>(
        &mut self,
        table: &str,
        columns_ddl: &str,
        insert_columns: &[&str],
        rows: &[T],
        mut bind: impl FnMut(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
    ) -> Result<()> {
        check_table_name(table)?;
        let staging = format!("{table}__staging");
        let placeholders: Vec<String> = (1..=insert_columns.len()).map(|i| format!("?{i}")).collect();

        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("begin replace of {table}"))?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {staging}; CREATE TABLE {staging} ({columns_ddl});"
        ))
        .with_context(|| format!("create staging table for {table}"))?;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {staging}({}) VALUES ({})",
                    insert_columns.join(", "),
                    placeholders.join(", ")
                ))
                .with_context(|| format!("prepare insert into {table}"))?;
            for row in rows {
                bind(&mut stmt, row).with_context(|| format!("insert row into {table}"))?;
            }
        }
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; ALTER TABLE {staging} RENAME TO {table};"
        ))
        .with_context(|| format!("swap in {table}"))?;
        tx.commit().with_context(|| format!("commit replace of {table}"))?;
        Ok(())
    }

    pub fn write_enriched(&mut self, table: &str, events: &[EnrichedEvent]) -> Result<()> {
        self.replace_table(
            table,
            r#"
            game_id INTEGER NOT NULL,
            event_number INTEGER NOT NULL,
            period INTEGER NOT NULL,
            event_time INTEGER NOT NULL,
            total_elapsed_time INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            external_event_id INTEGER NULL,
            scoring_team_id INTEGER NULL,
            goals_for INTEGER NOT NULL,
            goals_against INTEGER NOT NULL,
            goal_diff INTEGER NOT NULL,
            goal_diff_away INTEGER NOT NULL,
            manpower_home INTEGER NOT NULL,
            manpower_away INTEGER NOT NULL,
            manpower_diff INTEGER NOT NULL,
            manpower_diff_away INTEGER NOT NULL,
            outcome TEXT NOT NULL,
            outcome_away TEXT NOT NULL,
            home_players TEXT NOT NULL,
            away_players TEXT NOT NULL,
            date TEXT NULL,
            PRIMARY KEY (game_id, event_number)
            "#,
            &[
                "game_id",
                "event_number",
                "period",
                "event_time",
                "total_elapsed_time",
                "event_type",
                "home_team_id",
                "away_team_id",
                "external_event_id",
                "scoring_team_id",
                "goals_for",
                "goals_against",
                "goal_diff",
                "goal_diff_away",
                "manpower_home",
                "manpower_away",
                "manpower_diff",
                "manpower_diff_away",
                "outcome",
                "outcome_away",
                "home_players",
                "away_players",
                "date",
            ],
            events,
            |stmt, e| {
                let home_players = serde_json::to_string(&e.home_on_ice).unwrap_or_default();
                let away_players = serde_json::to_string(&e.away_on_ice).unwrap_or_default();
                stmt.execute(params![
                    e.game_id as i64,
                    e.event_number,
                    e.period,
                    e.clock_seconds,
                    e.elapsed,
                    e.event_type.as_str(),
                    e.home_team_id,
                    e.away_team_id,
                    e.external_event_id.map(|v| v as i64),
                    e.scoring_team_id,
                    e.home_goals,
                    e.away_goals,
                    e.goal_diff(Side::Home),
                    e.goal_diff(Side::Away),
                    e.manpower(Side::Home),
                    e.manpower(Side::Away),
                    e.manpower_diff(Side::Home),
                    e.manpower_diff(Side::Away),
                    e.outcome_for(Side::Home).as_str(),
                    e.outcome_for(Side::Away).as_str(),
                    home_players,
                    away_players,
                    e.game_date.map(|d| d.to_string()),
                ])
            },
        )
    }

    pub fn write_occurrences(&mut self, suffix: &str, rows: &[OccurrenceRow]) -> Result<()> {
        self.replace_table(
            &occurrences_table(suffix),
            r#"
            game_id INTEGER NOT NULL,
            event_number INTEGER NOT NULL,
            period INTEGER NOT NULL,
            scoring_team_id INTEGER NOT NULL,
            total_elapsed_time INTEGER NOT NULL,
            goal_diff INTEGER NOT NULL,
            manpower_diff INTEGER NOT NULL,
            goal_diff_after INTEGER NULL,
            manpower_diff_after INTEGER NULL,
            win_before INTEGER NOT NULL,
            loss_before INTEGER NOT NULL,
            tie_win_before INTEGER NOT NULL,
            tie_loss_before INTEGER NOT NULL,
            win_after INTEGER NOT NULL,
            loss_after INTEGER NOT NULL,
            tie_win_after INTEGER NOT NULL,
            tie_loss_after INTEGER NOT NULL,
            total_before INTEGER NOT NULL,
            total_after INTEGER NOT NULL,
            PRIMARY KEY (game_id, event_number)
            "#,
            &[
                "game_id",
                "event_number",
                "period",
                "scoring_team_id",
                "total_elapsed_time",
                "goal_diff",
                "manpower_diff",
                "goal_diff_after",
                "manpower_diff_after",
                "win_before",
                "loss_before",
                "tie_win_before",
                "tie_loss_before",
                "win_after",
                "loss_after",
                "tie_win_after",
                "tie_loss_after",
                "total_before",
                "total_after",
            ],
            rows,
            |stmt, r| {
                stmt.execute(params![
                    r.game_id as i64,
                    r.event_number,
                    r.period,
                    r.scoring_team_id,
                    r.elapsed,
                    r.before_state.goal_diff,
                    r.before_state.manpower_diff,
                    r.after_state.map(|s| s.goal_diff),
                    r.after_state.map(|s| s.manpower_diff),
                    r.before.win,
                    r.before.loss,
                    r.before.tie_win,
                    r.before.tie_loss,
                    r.after.win,
                    r.after.loss,
                    r.after.tie_win,
                    r.after.tie_loss,
                    r.before.total(),
                    r.after.total(),
                ])
            },
        )
    }

    pub fn load_occurrences(&self, suffix: &str) -> Result<Vec<OccurrenceRow>> {
        let table = occurrences_table(suffix);
        check_table_name(&table)?;
        if !self.table_exists(&table)? {
            return Err(anyhow!("occurrence table {table} does not exist"));
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"
                SELECT game_id, event_number, period, scoring_team_id, total_elapsed_time,
                       goal_diff, manpower_diff, goal_diff_after, manpower_diff_after,
                       win_before, loss_before, tie_win_before, tie_loss_before,
                       win_after, loss_after, tie_win_after, tie_loss_after
                FROM {table}
                ORDER BY game_id ASC, event_number ASC
                "#
            ))
            .with_context(|| format!("prepare load of {table}"))?;
        let rows = stmt
            .query_map([], |row| {
                let after_gd: Option<i32> = row.get(7)?;
                let after_md: Option<i32> = row.get(8)?;
                Ok(OccurrenceRow {
                    game_id: row.get::<_, u64>(0)?,
                    event_number: row.get(1)?,
                    period: row.get(2)?,
                    scoring_team_id: row.get(3)?,
                    elapsed: row.get(4)?,
                    before_state: GameState::new(row.get(5)?, row.get(6)?),
                    after_state: after_gd.zip(after_md).map(|(gd, md)| GameState::new(gd, md)),
                    before: OutcomeTally::new(row.get(9)?, row.get(10)?, row.get(11)?, row.get(12)?),
                    after: OutcomeTally::new(row.get(13)?, row.get(14)?, row.get(15)?, row.get(16)?),
                })
            })
            .with_context(|| format!("query {table}"))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode occurrence row")?);
        }
        Ok(out)
    }

    pub fn write_rewards(&mut self, suffix: &str, rows: &[RewardRow]) -> Result<()> {
        self.replace_table(
            &reward_table(suffix),
            r#"
            game_id INTEGER NOT NULL,
            event_number INTEGER NOT NULL,
            period INTEGER NOT NULL,
            scorer_id INTEGER NOT NULL,
            reward REAL NOT NULL,
            PRIMARY KEY (game_id, event_number)
            "#,
            &["game_id", "event_number", "period", "scorer_id", "reward"],
            rows,
            |stmt, r| {
                stmt.execute(params![
                    r.game_id as i64,
                    r.event_number,
                    r.period,
                    r.scorer_id,
                    r.reward
                ])
            },
        )
    }

    pub fn write_metric_table(&mut self, suffix: &str, table: &MetricTable) -> Result<()> {
        self.replace_table(
            &table.kind.table_name(suffix),
            r#"
            player_id INTEGER PRIMARY KEY,
            player_name TEXT NOT NULL,
            position TEXT NOT NULL,
            traditional INTEGER NOT NULL,
            weighted REAL NOT NULL,
            rank_traditional INTEGER NOT NULL,
            rank_weighted INTEGER NOT NULL,
            rank_diff INTEGER NOT NULL
            "#,
            &[
                "player_id",
                "player_name",
                "position",
                "traditional",
                "weighted",
                "rank_traditional",
                "rank_weighted",
                "rank_diff",
            ],
            &table.records,
            |stmt, r| {
                stmt.execute(params![
                    r.player_id,
                    r.name,
                    r.position.as_str(),
                    r.traditional,
                    round3(r.weighted),
                    r.rank_traditional,
                    r.rank_weighted,
                    r.rank_diff,
                ])
            },
        )
    }

    /// Read a stored metric table back; `None` when the run never produced it.
    pub fn load_metric_table(&self, kind: MetricKind, suffix: &str) -> Result<Option<MetricTable>> {
        let table = kind.table_name(suffix);
        check_table_name(&table)?;
        if !self.table_exists(&table)? {
            return Ok(None);
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"
                SELECT player_id, player_name, position, traditional, weighted,
                       rank_traditional, rank_weighted, rank_diff
                FROM {table}
                ORDER BY rank_weighted ASC
                "#
            ))
            .with_context(|| format!("prepare load of {table}"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .with_context(|| format!("query {table}"))?;
        let mut records = Vec::new();
        for row in rows {
            let (player_id, name, position, traditional, weighted, rank_t, rank_w, diff) =
                row.context("decode metric row")?;
            let Some(position) = Position::parse(&position) else {
                continue;
            };
            records.push(MetricRecord {
                player_id,
                name,
                position,
                traditional,
                weighted,
                rank_traditional: rank_t,
                rank_weighted: rank_w,
                rank_diff: diff,
            });
        }
        Ok(Some(MetricTable { kind, records }))
    }
}

impl DateCatalog for Store {
    fn games_per_date(&self, season: i32, game_type: u32) -> Result<Vec<(NaiveDate, usize)>> {
        let (lo, hi) = game_id_bounds(season, game_type);
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT d.date, COUNT(DISTINCT e.game_id)
                FROM play_by_play_events e
                JOIN game_date d ON d.game_id = e.game_id
                WHERE e.game_id BETWEEN ?1 AND ?2
                GROUP BY d.date
                ORDER BY d.date ASC
                "#,
            )
            .context("prepare games per date query")?;
        let rows = stmt
            .query_map(params![lo as i64, hi as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .context("query games per date")?;
        let mut out = Vec::new();
        for row in rows {
            let (date, games) = row.context("decode games per date row")?;
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .with_context(|| format!("parse game date `{date}`"))?;
            out.push((date, games.max(0) as usize));
        }
        Ok(out)
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let home = player_columns("home")
        .into_iter()
        .map(|c| format!("{c} INTEGER NULL"))
        .collect::<Vec<_>>()
        .join(",\n            ");
    let away = player_columns("away")
        .into_iter()
        .map(|c| format!("{c} INTEGER NULL"))
        .collect::<Vec<_>>()
        .join(",\n            ");
    conn.execute_batch(&format!(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS play_by_play_events (
            game_id INTEGER NOT NULL,
            event_number INTEGER NOT NULL,
            period INTEGER NOT NULL,
            event_time TEXT NOT NULL,
            event_type TEXT NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            external_event_id INTEGER NULL,
            {home},
            {away},
            PRIMARY KEY (game_id, event_number)
        );

        CREATE TABLE IF NOT EXISTS event_goal (
            game_id INTEGER NOT NULL,
            event_number INTEGER NOT NULL,
            goal_id INTEGER NULL,
            scoring_team_id INTEGER NOT NULL,
            scorer_id INTEGER NOT NULL,
            first_assist_id INTEGER NULL,
            second_assist_id INTEGER NULL,
            PRIMARY KEY (game_id, event_number)
        );

        CREATE TABLE IF NOT EXISTS player (
            player_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            position TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS game_date (
            game_id INTEGER PRIMARY KEY,
            date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_game_date_date ON game_date(date);
        "#
    ))
    .context("create sqlite schema")?;
    Ok(())
}
