use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::Transaction;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{self, Session};
use crate::error::SetupError;
use crate::schema::ProductRow;
use crate::setup::Store;

// category first, product references it, saved references product
pub const TABLES: [(&str, &str); 3] = [
    (
        "category",
        "CREATE TABLE IF NOT EXISTS category (
            id      SERIAL PRIMARY KEY,
            name    VARCHAR(255)
        )",
    ),
    (
        "product",
        "CREATE TABLE IF NOT EXISTS product (
            id                  SERIAL PRIMARY KEY,
            product_name        TEXT,
            nutriscore_grade    TEXT,
            url                 TEXT,
            stores              TEXT,
            purchase_places     TEXT,
            pnns_groups_1       TEXT,
            pnns_groups_2       INTEGER REFERENCES category (id)
        )",
    ),
    (
        "saved",
        "CREATE TABLE IF NOT EXISTS saved (
            id  INTEGER UNIQUE,
            CONSTRAINT fk_product_id
                FOREIGN KEY (id)
                REFERENCES product (id)
                ON DELETE CASCADE
                ON UPDATE CASCADE
        )",
    ),
];

const INSERT_CATEGORY: &str = "INSERT INTO category (name) VALUES ($1)";

const INSERT_PRODUCT: &str = "
    INSERT INTO product (
        product_name, nutriscore_grade, url, stores,
        purchase_places, pnns_groups_1, pnns_groups_2
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7)
";

pub fn create_database_sql(name: &str) -> Result<String, SetupError> {
    engine::validate_db_name(name)?;
    Ok(format!(
        "CREATE DATABASE \"{name}\" ENCODING 'UTF8' TEMPLATE template0"
    ))
}

/// PostgreSQL-backed store. Every operation opens its own session.
pub struct PgStore {
    config: Config,
}

impl PgStore {
    pub fn new(config: &Config) -> Self {
        PgStore {
            config: config.clone(),
        }
    }

    async fn admin(&self) -> Result<Session, SetupError> {
        engine::connect(&self.config, &self.config.database.admin_database).await
    }

    async fn target(&self) -> Result<Session, SetupError> {
        engine::connect(&self.config, &self.config.database.name).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn database_exists(&self) -> Result<bool, SetupError> {
        let session = self.admin().await?;
        let rows = session
            .query("SELECT datname FROM pg_database", &[])
            .await
            .map_err(|e| SetupError::database("listing databases", e))?;

        let name = self.config.database.name.as_str();
        Ok(rows.iter().any(|row| row.get::<_, &str>(0) == name))
    }

    async fn create_database(&self) -> Result<(), SetupError> {
        let name = &self.config.database.name;
        let sql = create_database_sql(name)?;
        let session = self.admin().await?;

        info!(database = %name, "Creating database ...");
        match session.batch_execute(&sql).await {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
                debug!(database = %name, "database already present");
                Ok(())
            }
            Err(e) => Err(SetupError::database(format!("creating database {name}"), e)),
        }
    }

    async fn create_tables(&self) -> Result<(), SetupError> {
        info!("Creating tables ...");
        let session = self.target().await?;
        for (table, ddl) in TABLES {
            session
                .batch_execute(ddl)
                .await
                .map_err(|e| SetupError::database(format!("creating table {table}"), e))?;
            debug!(table, "table ready");
        }
        Ok(())
    }

    async fn insert_categories(&self, names: &[String]) -> Result<u64, SetupError> {
        info!(rows = names.len(), "Inserting categories ...");
        let mut session = self.target().await?;
        let tx = begin(&mut session, "category").await?;
        let stmt = tx
            .prepare(INSERT_CATEGORY)
            .await
            .map_err(|e| SetupError::database("preparing category insert", e))?;

        let mut inserted = 0;
        for name in names {
            if let Err(e) = tx.execute(&stmt, &[name]).await {
                rollback(tx, "category").await;
                return Err(SetupError::database(format!("inserting category '{name}'"), e));
            }
            inserted += 1;
        }
        commit(tx, "category").await?;
        Ok(inserted)
    }

    async fn insert_products(&self, rows: &[ProductRow]) -> Result<u64, SetupError> {
        info!(rows = rows.len(), "Inserting products ...");
        let mut session = self.target().await?;
        let tx = begin(&mut session, "product").await?;
        let stmt = tx
            .prepare(INSERT_PRODUCT)
            .await
            .map_err(|e| SetupError::database("preparing product insert", e))?;

        let mut inserted = 0;
        for row in rows {
            let result = tx
                .execute(
                    &stmt,
                    &[
                        &row.product_name,
                        &row.nutriscore_grade,
                        &row.url,
                        &row.stores,
                        &row.purchase_places,
                        &row.pnns_groups_1,
                        &row.pnns_groups_2,
                    ],
                )
                .await;
            if let Err(e) = result {
                rollback(tx, "product").await;
                return Err(SetupError::database(
                    format!(
                        "inserting product '{}'",
                        row.product_name.as_deref().unwrap_or("<null>")
                    ),
                    e,
                ));
            }
            inserted += 1;
        }
        commit(tx, "product").await?;
        Ok(inserted)
    }
}

async fn begin<'a>(session: &'a mut Session, table: &str) -> Result<Transaction<'a>, SetupError> {
    session
        .transaction()
        .await
        .map_err(|e| SetupError::database(format!("starting transaction for {table}"), e))
}

async fn commit(tx: Transaction<'_>, table: &str) -> Result<(), SetupError> {
    tx.commit()
        .await
        .map_err(|e| SetupError::database(format!("committing {table} rows"), e))
}

// the row error is what gets reported; a failed rollback is only logged
async fn rollback(tx: Transaction<'_>, table: &str) {
    match tx.rollback().await {
        Ok(()) => warn!(table, "insert failed, transaction rolled back"),
        Err(e) => warn!(table, error = %e, "insert failed and rollback did not complete"),
    }
}
