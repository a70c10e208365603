use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

/// API-Football id of the English Premier League.
pub const DEFAULT_LEAGUE: u32 = 39;
pub const DEFAULT_SEASON: i32 = 2023;
pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5432;

#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub key: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl PgConfig {
    /// `user@host:port/database`, never includes the password.
    pub fn display_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Target {
    Postgres(PgConfig),
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub api: ApiConfig,
    pub target: Target,
    pub league: u32,
    pub season: i32,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{key} is not set"));

        let api = ApiConfig {
            host: require("API_HOST")?.trim_end_matches('/').to_string(),
            key: require("API_KEY")?,
        };

        let league = match get("LEAGUE") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("LEAGUE={raw} is not a league id"))?,
            None => DEFAULT_LEAGUE,
        };
        let season = match get("SEASON") {
            Some(raw) => raw
                .parse::<i32>()
                .with_context(|| format!("SEASON={raw} is not a year"))?,
            None => DEFAULT_SEASON,
        };

        let target = match get("SQLITE_PATH") {
            Some(path) => Target::Sqlite(PathBuf::from(path)),
            None => {
                let port = match get("PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .with_context(|| format!("PORT={raw} is not a port number"))?,
                    None => DEFAULT_PG_PORT,
                };
                Target::Postgres(PgConfig {
                    host: get("HOST").unwrap_or_else(|| DEFAULT_PG_HOST.to_string()),
                    port,
                    database: require("DB")?,
                    user: require("USER")?,
                    password: get("PASSWORD"),
                })
            }
        };

        Ok(Self {
            api,
            target,
            league,
            season,
        })
    }
}
