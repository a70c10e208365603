use std::process::ExitCode;

use epl_standings::config::EtlConfig;
use epl_standings::pipeline::run_etl;
use epl_standings::store::open_store;

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    epl_standings::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let config = EtlConfig::from_lookup(|key| {
        arg_override(&args, key).or_else(|| std::env::var(key).ok())
    });
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            log::error!("invalid configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut store = open_store(&config.target);
    if run_etl(&config, store.as_mut()) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// `--season`, `--league` and `--sqlite` win over their environment variables.
fn arg_override(args: &[String], key: &str) -> Option<String> {
    let flag = match key {
        "SEASON" => "--season",
        "LEAGUE" => "--league",
        "SQLITE_PATH" => "--sqlite",
        _ => return None,
    };
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg
            .strip_prefix(flag)
            .and_then(|rest| rest.strip_prefix('='))
        {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
