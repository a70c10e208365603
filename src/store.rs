use anyhow::Result;

use crate::config::Target;
use crate::pg_store::PgStore;
use crate::sqlite_store::SqliteStore;
use crate::standings::StandingRecord;

pub const STANDINGS_TABLE: &str = "standings";
pub const POSITION_CONSTRAINT: &str = "uix_season_position";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Created,
    AlreadyExists,
}

/// Destination of the load phase. Each call opens and closes its own connection.
pub trait StandingsStore {
    /// Human-readable target for log lines; must not contain secrets.
    fn describe(&self) -> String;

    fn ensure_database(&mut self) -> Result<DatabaseStatus>;

    fn ensure_schema(&mut self) -> Result<()>;

    /// Inserts or overwrites every record keyed by (season, team_id) in one
    /// transaction. Returns the number of rows written.
    ///
    /// `records` must not repeat a (season, team_id): Postgres rejects a
    /// statement that touches one row twice. `transform_standings` guarantees it.
    fn upsert(&mut self, records: &[StandingRecord]) -> Result<usize>;
}

pub fn open_store(target: &Target) -> Box<dyn StandingsStore> {
    match target {
        Target::Postgres(cfg) => Box::new(PgStore::new(cfg.clone())),
        Target::Sqlite(path) => Box::new(SqliteStore::new(path.clone())),
    }
}

/// Multi-row upsert for `rows` records; `placeholder` renders the n-th
/// (1-based) bind parameter for the driver.
pub(crate) fn upsert_statement(rows: usize, placeholder: impl Fn(usize) -> String) -> String {
    let width = StandingRecord::COLUMNS.len();
    let values = (0..rows)
        .map(|row| {
            let params = (1..=width)
                .map(|col| placeholder(row * width + col))
                .collect::<Vec<_>>();
            format!("({})", params.join(", "))
        })
        .collect::<Vec<_>>();
    let updates = StandingRecord::update_columns()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>();

    format!(
        "INSERT INTO {STANDINGS_TABLE} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
        StandingRecord::COLUMNS.join(", "),
        values.join(", "),
        StandingRecord::KEY_COLUMNS.join(", "),
        updates.join(", ")
    )
}

pub(crate) fn select_season_statement(season_param: &str) -> String {
    format!(
        "SELECT {} FROM {STANDINGS_TABLE} WHERE season = {season_param} ORDER BY position",
        StandingRecord::COLUMNS.join(", ")
    )
}
