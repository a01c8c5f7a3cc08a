use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use crate::config::Config;
use crate::error::SetupError;

// GENERALISED FUNCTIONS

/// A live connection to one database.
///
/// Owns both the client and the task driving the connection; dropping the
/// session closes the client and stops the task, on every exit path. If
/// `connect` fails there is no session and nothing to release.
pub struct Session {
    client: Client,
    connection: JoinHandle<()>,
    database: String,
}

impl Deref for Session {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.abort();
        debug!(database = %self.database, "connection closed");
    }
}

// open a connection to `dbname` using the server/credentials from config
pub async fn connect(config: &Config, dbname: &str) -> Result<Session, SetupError> {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.server.host)
        .port(config.server.port)
        .user(&config.database.username)
        .password(&config.database.password)
        .dbname(dbname);

    let (client, connection) = pg
        .connect(NoTls)
        .await
        .map_err(|source| SetupError::Connect {
            database: dbname.to_string(),
            source,
        })?;

    // single task to handle connection (error)
    let name = dbname.to_string();
    let connection = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(database = %name, error = %e, "connection failed");
        }
    });

    debug!(database = dbname, "connected");
    Ok(Session {
        client,
        connection,
        database: dbname.to_string(),
    })
}

// GET a url and deserialise the body as JSON into type T
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: reqwest::Url,
    user_agent: &str,
) -> Result<T, SetupError> {
    let shown = url.to_string();
    let fetch_err = |source| SetupError::Fetch {
        url: shown.clone(),
        source,
    };

    debug!(url = %shown, "requesting");
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;

    let body = response.text().await.map_err(fetch_err)?;
    serde_json::from_str(&body).map_err(|source| SetupError::Decode {
        url: shown.clone(),
        source,
    })
}

// database names are embedded in DDL (no bind params there), so keep them plain
pub fn validate_db_name(name: &str) -> Result<(), SetupError> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(SetupError::InvalidDatabaseName(name.to_string()))
    }
}
