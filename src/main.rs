pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod off;
pub mod schema;
pub mod setup;
pub mod store;

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{error, info};

use crate::off::OpenFoodFacts;
use crate::setup::{Outcome, SetupDatabase};
use crate::store::PgStore;

// local postgres for testing; terminal command:
// sudo docker run --name offdb -e POSTGRES_PASSWORD=... -p 5432:5432 -d postgres

#[tokio::main]
async fn main() -> ExitCode {
    // .env may carry OFFDB_DB_PASSWORD / OFFDB_LOG
    dotenv::dotenv().ok();
    logging::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_PATH.to_string());

    match run(&path).await {
        Ok(Outcome::AlreadyExists) => ExitCode::SUCCESS,
        Ok(Outcome::Populated(report)) => {
            info!(
                categories = report.categories,
                products = report.products,
                skipped = report.skipped,
                "Done!"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> Result<Outcome> {
    // Load config variables
    let config = config::load(path).with_context(|| format!("loading config from {path}"))?;

    let store = PgStore::new(&config);
    let source = OpenFoodFacts::new(&config)?;

    let outcome = SetupDatabase::new(&config, store, source)
        .run()
        .await
        .with_context(|| format!("setting up database '{}'", config.database.name))?;
    Ok(outcome)
}
