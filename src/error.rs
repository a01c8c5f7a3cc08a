use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a setup run.
///
/// Incomplete product records are not errors; they are counted and skipped
/// during extraction.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid database name '{0}': only ASCII alphanumerics, '_' and '-' allowed")]
    InvalidDatabaseName(String),

    #[error("could not connect to database '{database}': {source}")]
    Connect {
        database: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("database error while {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SetupError {
    pub fn database(context: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SetupError::Database {
            context: context.into(),
            source,
        }
    }
}
