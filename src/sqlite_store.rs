use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, ToSql, params};

use crate::standings::{DEFAULT_DESCRIPTION, StandingRecord};
use crate::store::{
    DatabaseStatus, POSITION_CONSTRAINT, STANDINGS_TABLE, StandingsStore, select_season_statement,
    upsert_statement,
};

/// Standings in a local SQLite file. The file plays the role of the database.
///
/// SQLite checks the (season, position) constraint row by row and cannot
/// defer it, so `upsert` moves the season's stored ranks out of the way first.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("open sqlite db {}", self.path.display()))
    }

    pub fn load_season(&self, season: i32) -> Result<Vec<StandingRecord>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(&select_season_statement("?1"))
            .context("prepare standings query")?;
        let rows = stmt
            .query_map(params![season], |row| {
                Ok(StandingRecord {
                    season: row.get(0)?,
                    position: row.get(1)?,
                    team_id: row.get(2)?,
                    team_name: row.get(3)?,
                    team_logo: row.get(4)?,
                    played: row.get(5)?,
                    won: row.get(6)?,
                    draw: row.get(7)?,
                    lose: row.get(8)?,
                    goals_for: row.get(9)?,
                    goals_against: row.get(10)?,
                    goal_difference: row.get(11)?,
                    points: row.get(12)?,
                    form: row.get(13)?,
                    description: row.get(14)?,
                })
            })
            .context("query standings")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode standings row")?);
        }
        Ok(out)
    }
}

impl StandingsStore for SqliteStore {
    fn describe(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    fn ensure_database(&mut self) -> Result<DatabaseStatus> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let existed = self.path.exists();
        self.open()?;
        Ok(if existed {
            DatabaseStatus::AlreadyExists
        } else {
            DatabaseStatus::Created
        })
    }

    fn ensure_schema(&mut self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS {STANDINGS_TABLE} (
                season INTEGER NOT NULL,
                position INTEGER NOT NULL,
                team_id INTEGER NOT NULL,
                team_name VARCHAR(100) NOT NULL,
                team_logo VARCHAR(100) NOT NULL,
                played INTEGER NOT NULL,
                won INTEGER NOT NULL,
                draw INTEGER NOT NULL,
                lose INTEGER NOT NULL,
                goals_for INTEGER NOT NULL,
                goals_against INTEGER NOT NULL,
                goal_difference INTEGER NOT NULL,
                points INTEGER NOT NULL,
                form VARCHAR(5) NOT NULL,
                description VARCHAR(100) NOT NULL DEFAULT '{DEFAULT_DESCRIPTION}',
                PRIMARY KEY (season, team_id),
                CONSTRAINT {POSITION_CONSTRAINT} UNIQUE (season, position)
            );
            "#
        ))
        .context("create sqlite schema")?;
        Ok(())
    }

    fn upsert(&mut self, records: &[StandingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.open()?;
        let sql = upsert_statement(records.len(), |n| format!("?{n}"));
        let params = records
            .iter()
            .flat_map(row_params)
            .collect::<Vec<&dyn ToSql>>();

        let mut seasons = records.iter().map(|r| r.season).collect::<Vec<_>>();
        seasons.sort_unstable();
        seasons.dedup();

        let tx = conn.transaction().context("begin upsert transaction")?;
        // Park existing ranks below zero so rows can trade positions; anything
        // the batch did not touch gets its rank back afterwards.
        for season in &seasons {
            tx.execute(
                &format!(
                    "UPDATE {STANDINGS_TABLE} SET position = -position \
                     WHERE season = ?1 AND position > 0"
                ),
                params![season],
            )
            .context("park standings positions")?;
        }
        let written = tx
            .execute(&sql, params.as_slice())
            .context("upsert standings")?;
        for season in &seasons {
            tx.execute(
                &format!(
                    "UPDATE {STANDINGS_TABLE} SET position = -position \
                     WHERE season = ?1 AND position < 0"
                ),
                params![season],
            )
            .context("restore untouched standings positions")?;
        }
        tx.commit().context("commit upsert transaction")?;
        Ok(written)
    }
}

fn row_params(r: &StandingRecord) -> [&dyn ToSql; 15] {
    [
        &r.season,
        &r.position,
        &r.team_id,
        &r.team_name,
        &r.team_logo,
        &r.played,
        &r.won,
        &r.draw,
        &r.lose,
        &r.goals_for,
        &r.goals_against,
        &r.goal_difference,
        &r.points,
        &r.form,
        &r.description,
    ]
}
