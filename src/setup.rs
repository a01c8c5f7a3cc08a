use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::error::SetupError;
use crate::off::{self, CategoryIndex};
use crate::schema::{ProductRow, SearchResponse};

/// Where the raw product page comes from.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch(&self) -> Result<SearchResponse, SetupError>;
}

/// The database side of the setup.
#[async_trait]
pub trait Store: Send + Sync {
    async fn database_exists(&self) -> Result<bool, SetupError>;
    async fn create_database(&self) -> Result<(), SetupError>;
    /// Must be safe to call against an existing schema.
    async fn create_tables(&self) -> Result<(), SetupError>;
    async fn insert_categories(&self, names: &[String]) -> Result<u64, SetupError>;
    async fn insert_products(&self, rows: &[ProductRow]) -> Result<u64, SetupError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Target database was already there; nothing was fetched or written.
    AlreadyExists,
    Populated(Report),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub categories: u64,
    pub products: u64,
    pub skipped: usize,
}

/// First-run population of the product database.
pub struct SetupDatabase<S, P> {
    store: S,
    source: P,
    database: String,
    categories: Vec<String>,
}

impl<S: Store, P: ProductSource> SetupDatabase<S, P> {
    pub fn new(config: &Config, store: S, source: P) -> Self {
        SetupDatabase {
            store,
            source,
            database: config.database.name.clone(),
            categories: config.categories.clone(),
        }
    }

    pub async fn run(&self) -> Result<Outcome, SetupError> {
        if self.store.database_exists().await? {
            info!(database = %self.database, "Database already exists, nothing to do");
            return Ok(Outcome::AlreadyExists);
        }

        let response = self.source.fetch().await?;

        self.store.create_database().await?;
        self.store.create_tables().await?;

        let index = CategoryIndex::new(&self.categories);
        let extraction = off::extract_rows(&response, &index);
        if extraction.skipped > 0 {
            info!(
                kept = extraction.rows.len(),
                skipped = extraction.skipped,
                "Skipped incomplete or uncategorised products"
            );
        }

        // category ids must exist before products reference them
        let categories = self.store.insert_categories(&self.categories).await?;
        let products = self.store.insert_products(&extraction.rows).await?;

        info!(categories, products, "Database populated");
        Ok(Outcome::Populated(Report {
            categories,
            products,
            skipped: extraction.skipped,
        }))
    }
}
