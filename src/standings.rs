use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_DESCRIPTION: &str = "EPL: Next Season";

/// One team's row in a season's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingRecord {
    pub season: i32,
    pub position: i32,
    pub team_id: i32,
    pub team_name: String,
    pub team_logo: String,
    pub played: i32,
    pub won: i32,
    pub draw: i32,
    pub lose: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_difference: i32,
    pub points: i32,
    pub form: String,
    pub description: String,
}

impl StandingRecord {
    pub const COLUMNS: [&'static str; 15] = [
        "season",
        "position",
        "team_id",
        "team_name",
        "team_logo",
        "played",
        "won",
        "draw",
        "lose",
        "goals_for",
        "goals_against",
        "goal_difference",
        "points",
        "form",
        "description",
    ];

    pub const KEY_COLUMNS: [&'static str; 2] = ["season", "team_id"];

    pub fn update_columns() -> impl Iterator<Item = &'static str> {
        Self::COLUMNS
            .into_iter()
            .filter(|c| !Self::KEY_COLUMNS.contains(c))
    }

    fn fill_default_description(&mut self) {
        if self.description.trim().is_empty() {
            self.description = DEFAULT_DESCRIPTION.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("missing key `{0}`")]
    MissingKey(&'static str),
    #[error("key `{key}` is not {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
    #[error("team {0} already listed earlier in the group")]
    DuplicateTeam(i32),
}

impl EntryError {
    pub fn key(&self) -> &'static str {
        match self {
            EntryError::MissingKey(key) => key,
            EntryError::WrongType { key, .. } => key,
            EntryError::DuplicateTeam(_) => "team.id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub index: usize,
    pub error: EntryError,
}

#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub records: Vec<StandingRecord>,
    pub skipped: Vec<Skipped>,
}

/// Reshapes raw standings entries into records, keeping input order.
///
/// Entries with a missing or mistyped required key are logged and dropped;
/// the rest still come through. A team listed twice keeps its first entry, so
/// the batch never upserts the same (season, team_id) twice. Blank
/// descriptions get [`DEFAULT_DESCRIPTION`].
pub fn transform_standings(entries: &[Value], season: i32) -> Transformed {
    let mut out = Transformed {
        records: Vec::with_capacity(entries.len()),
        skipped: Vec::new(),
    };

    let mut seen = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let parsed = parse_standing_entry(entry, season).and_then(|record| {
            if seen.insert(record.team_id) {
                Ok(record)
            } else {
                Err(EntryError::DuplicateTeam(record.team_id))
            }
        });
        match parsed {
            Ok(record) => out.records.push(record),
            Err(error) => {
                log::warn!("skipping standings entry {index}: {error}");
                log::warn!("problem entry: {entry}");
                out.skipped.push(Skipped { index, error });
            }
        }
    }

    for record in &mut out.records {
        record.fill_default_description();
    }
    out
}

/// Parses one entry of `response[0].league.standings[0]`.
///
/// `description` is optional and comes back empty when absent or null.
pub fn parse_standing_entry(entry: &Value, season: i32) -> Result<StandingRecord, EntryError> {
    Ok(StandingRecord {
        season,
        position: int_at(entry, "rank")?,
        team_id: int_at(entry, "team.id")?,
        team_name: str_at(entry, "team.name")?,
        team_logo: str_at(entry, "team.logo")?,
        played: int_at(entry, "all.played")?,
        won: int_at(entry, "all.win")?,
        draw: int_at(entry, "all.draw")?,
        lose: int_at(entry, "all.lose")?,
        goals_for: int_at(entry, "all.goals.for")?,
        goals_against: int_at(entry, "all.goals.against")?,
        goal_difference: int_at(entry, "goalsDiff")?,
        points: int_at(entry, "points")?,
        form: str_at(entry, "form")?,
        description: match lookup(entry, "description") {
            Ok(v) => v
                .as_str()
                .map(|s| s.to_string())
                .ok_or(EntryError::WrongType {
                    key: "description",
                    expected: "a string",
                })?,
            Err(_) => String::new(),
        },
    })
}

// Null counts as missing: api-sports sends `null` rather than dropping keys.
fn lookup<'a>(entry: &'a Value, path: &'static str) -> Result<&'a Value, EntryError> {
    let mut cur = entry;
    for part in path.split('.') {
        cur = cur
            .get(part)
            .filter(|v| !v.is_null())
            .ok_or(EntryError::MissingKey(path))?;
    }
    Ok(cur)
}

fn int_at(entry: &Value, path: &'static str) -> Result<i32, EntryError> {
    lookup(entry, path)?
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or(EntryError::WrongType {
            key: path,
            expected: "a 32-bit integer",
        })
}

fn str_at(entry: &Value, path: &'static str) -> Result<String, EntryError> {
    lookup(entry, path)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or(EntryError::WrongType {
            key: path,
            expected: "a string",
        })
}
