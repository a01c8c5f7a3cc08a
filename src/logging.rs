use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "OFFDB_LOG";

// Defaults to info for this crate, still overridable via OFFDB_LOG.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("info,tokio_postgres=warn,reqwest=warn,hyper=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}
