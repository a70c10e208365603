use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::EtlConfig;
use crate::standings::{Skipped, StandingRecord, transform_standings};
use crate::standings_fetch::fetch_standings;
use crate::store::{DatabaseStatus, StandingsStore};

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("error fetching data from API: {0:#}")]
    Extract(anyhow::Error),
    #[error("error loading data into {target}: {cause:#}")]
    Load { target: String, cause: anyhow::Error },
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub league: u32,
    pub season: i32,
    pub fetched: usize,
    pub skipped: Vec<Skipped>,
    pub database: DatabaseStatus,
    pub upserted: usize,
}

/// Runs extract, transform and load once. Failures are logged and turned into `false`.
pub fn run_etl(config: &EtlConfig, store: &mut dyn StandingsStore) -> bool {
    match execute(config, store) {
        Ok(_) => true,
        Err(err) => {
            log::error!("{err}");
            false
        }
    }
}

pub fn execute(config: &EtlConfig, store: &mut dyn StandingsStore) -> Result<RunSummary, EtlError> {
    let started_at = Utc::now();
    let clock = Instant::now();
    log::info!(
        "[{}] starting ETL pipeline (league {}, season {})",
        started_at.to_rfc3339(),
        config.league,
        config.season
    );

    log::info!("step 1: extracting standings from API");
    let entries =
        fetch_standings(&config.api, config.league, config.season).map_err(EtlError::Extract)?;
    log::info!("fetched standings for {} teams", entries.len());

    log::info!("step 2: transforming standings");
    let transformed = transform_standings(&entries, config.season);
    if transformed.skipped.is_empty() {
        log::info!("transformed {} rows", transformed.records.len());
    } else {
        log::warn!(
            "transformed {} rows, skipped {}",
            transformed.records.len(),
            transformed.skipped.len()
        );
    }

    log::info!("step 3: loading standings into {}", store.describe());
    let (database, upserted) =
        load(store, &transformed.records).map_err(|cause| EtlError::Load {
            target: store.describe(),
            cause,
        })?;

    log::info!(
        "[{}] ETL pipeline completed in {:.1}s (started {})",
        Utc::now().to_rfc3339(),
        clock.elapsed().as_secs_f64(),
        started_at.to_rfc3339()
    );
    Ok(RunSummary {
        started_at,
        league: config.league,
        season: config.season,
        fetched: entries.len(),
        skipped: transformed.skipped,
        database,
        upserted,
    })
}

/// Provisions the database and table, then upserts `records` as one batch.
pub fn load(
    store: &mut dyn StandingsStore,
    records: &[StandingRecord],
) -> Result<(DatabaseStatus, usize)> {
    let database = store.ensure_database()?;
    match database {
        DatabaseStatus::Created => log::info!("database created"),
        DatabaseStatus::AlreadyExists => log::info!("database already exists"),
    }

    store.ensure_schema()?;
    log::info!("table 'standings' created/verified");

    let upserted = store.upsert(records)?;
    log::info!("upserted {upserted} rows");
    Ok((database, upserted))
}
