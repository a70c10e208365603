pub mod config;
pub mod http_client;
pub mod pg_store;
pub mod pipeline;
pub mod sqlite_store;
pub mod standings;
pub mod standings_fetch;
pub mod store;

/// Timestamped console logging at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
