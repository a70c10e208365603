use std::time::Duration;

use anyhow::{Context, Result};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls};

use crate::config::PgConfig;
use crate::standings::{DEFAULT_DESCRIPTION, StandingRecord};
use crate::store::{
    DatabaseStatus, POSITION_CONSTRAINT, STANDINGS_TABLE, StandingsStore, select_season_statement,
    upsert_statement,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct PgStore {
    config: PgConfig,
}

impl PgStore {
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Server-level connection; no dbname, so the server picks the user's default.
    fn server_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        if let Some(password) = self.config.password.as_deref() {
            cfg.password(password);
        }
        cfg
    }

    fn database_config(&self) -> Config {
        let mut cfg = self.server_config();
        cfg.dbname(&self.config.database);
        cfg
    }

    fn connect(&self, cfg: &Config) -> Result<Client> {
        cfg.connect(NoTls)
            .with_context(|| format!("connect to postgres {}", self.describe()))
    }

    pub fn load_season(&self, season: i32) -> Result<Vec<StandingRecord>> {
        let mut client = self.connect(&self.database_config())?;
        let rows = client
            .query(select_season_statement("$1").as_str(), &[&season])
            .context("query standings")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(StandingRecord {
                season: row.try_get(0).context("decode standings row")?,
                position: row.try_get(1).context("decode standings row")?,
                team_id: row.try_get(2).context("decode standings row")?,
                team_name: row.try_get(3).context("decode standings row")?,
                team_logo: row.try_get(4).context("decode standings row")?,
                played: row.try_get(5).context("decode standings row")?,
                won: row.try_get(6).context("decode standings row")?,
                draw: row.try_get(7).context("decode standings row")?,
                lose: row.try_get(8).context("decode standings row")?,
                goals_for: row.try_get(9).context("decode standings row")?,
                goals_against: row.try_get(10).context("decode standings row")?,
                goal_difference: row.try_get(11).context("decode standings row")?,
                points: row.try_get(12).context("decode standings row")?,
                form: row.try_get(13).context("decode standings row")?,
                description: row.try_get(14).context("decode standings row")?,
            });
        }
        Ok(out)
    }
}

impl StandingsStore for PgStore {
    fn describe(&self) -> String {
        format!("postgres://{}", self.config.display_target())
    }

    fn ensure_database(&mut self) -> Result<DatabaseStatus> {
        let mut client = self.connect(&self.server_config())?;
        // Simple-query protocol runs outside any transaction block, which CREATE DATABASE needs.
        let stmt = format!("CREATE DATABASE {}", quote_ident(&self.config.database));
        match client.batch_execute(&stmt) {
            Ok(()) => Ok(DatabaseStatus::Created),
            Err(err) if err.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
                Ok(DatabaseStatus::AlreadyExists)
            }
            Err(err) => {
                Err(err).with_context(|| format!("create database {}", self.config.database))
            }
        }
    }

    fn ensure_schema(&mut self) -> Result<()> {
        let mut client = self.connect(&self.database_config())?;
        client
            .batch_execute(&schema_statement())
            .context("create standings table")?;
        Ok(())
    }

    fn upsert(&mut self, records: &[StandingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut client = self.connect(&self.database_config())?;
        let sql = upsert_statement(records.len(), |n| format!("${n}"));
        let params = records
            .iter()
            .flat_map(row_params)
            .collect::<Vec<&(dyn ToSql + Sync)>>();

        let mut tx = client.transaction().context("begin upsert transaction")?;
        let written = tx
            .execute(sql.as_str(), &params)
            .context("upsert standings")?;
        tx.commit().context("commit upsert transaction")?;
        Ok(written as usize)
    }
}

fn row_params(r: &StandingRecord) -> [&(dyn ToSql + Sync); 15] {
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

// The position constraint is deferred so a batch that swaps two ranks only
// has to be consistent at commit. ON CONFLICT arbitrates on the primary key,
// which stays immediate.
fn schema_statement() -> String {
    format!(
        r#"
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
            CONSTRAINT {POSITION_CONSTRAINT} UNIQUE (season, position) DEFERRABLE INITIALLY DEFERRED
        );
        "#
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
