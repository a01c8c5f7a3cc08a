use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::engine;
use crate::error::SetupError;

pub const DEFAULT_PATH: &str = "config.toml";

// overrides database.password when set (also read from .env)
pub const PASSWORD_ENV: &str = "OFFDB_DB_PASSWORD";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: Auth,
    pub server: Server,
    pub database: Database,
    #[serde(default)]
    pub api: Api,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Auth {
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Database {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    // existence checks and CREATE DATABASE run here
    #[serde(default = "default_admin_database")]
    pub admin_database: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Api {
    pub url: String,
    pub page_size: u32,
    pub page: u32,
    pub country: String,
}

impl Default for Api {
    fn default() -> Self {
        Api {
            url: "https://fr.openfoodfacts.org/cgi/search.pl".to_string(),
            page_size: 500,
            page: 1,
            country: "france".to_string(),
        }
    }
}

fn default_admin_database() -> String {
    "postgres".to_string()
}

/// Read a `.toml` (or `.yaml`/`.yml`) config file, apply environment
/// overrides and validate it.
pub fn load(path: impl AsRef<Path>) -> Result<Config, SetupError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| SetupError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|source| SetupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

    let mut config = parse(path, &contents)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn parse(path: &Path, contents: &str) -> Result<Config, SetupError> {
    let parse_err = |message: String| SetupError::ConfigParse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string()))
        }
        _ => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
    }
}

impl Config {
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.database.password = password;
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |msg: &str| Err(SetupError::Config(msg.to_string()));

        if self.auth.user_agent.trim().is_empty() {
            return invalid("auth.user_agent must not be empty");
        }
        if self.server.host.trim().is_empty() {
            return invalid("server.host must not be empty");
        }
        if self.server.port == 0 {
            return invalid("server.port must not be 0");
        }
        if self.database.name.trim().is_empty() {
            return invalid("database.name must not be empty");
        }
        engine::validate_db_name(&self.database.name)?;
        if self.database.username.trim().is_empty() {
            return invalid("database.username must not be empty");
        }
        if self.database.admin_database.trim().is_empty() {
            return invalid("database.admin_database must not be empty");
        }
        if self.database.admin_database == self.database.name {
            return invalid("database.name must differ from database.admin_database");
        }
        if self.api.url.trim().is_empty() {
            return invalid("api.url must not be empty");
        }
        if self.api.page_size == 0 {
            return invalid("api.page_size must be at least 1");
        }
        if self.categories.is_empty() {
            return invalid("categories must list at least one category");
        }

        let mut seen = HashSet::new();
        for name in &self.categories {
            if name.trim().is_empty() {
                return invalid("categories must not contain blank names");
            }
            if !seen.insert(name.as_str()) {
                return Err(SetupError::Config(format!(
                    "category '{name}' is listed more than once"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
categories = ["Sweets", "Biscuits and cakes", "Cheese"]

[auth]
user_agent = "offdb - test"

[server]
host = "localhost"
port = 5432

[database]
name = "openfoodfacts"
username = "postgres"
password = "secret"
"#;

    fn sample() -> Config {
        toml::from_str(SAMPLE).unwrap()
    }

    fn write_config(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_toml_with_defaults() {
        let (_dir, path) = write_config("config.toml", SAMPLE);
        let config = load(&path).unwrap();

        assert_eq!(config.database.name, "openfoodfacts");
        assert_eq!(config.database.admin_database, "postgres");
        assert_eq!(config.api.page_size, 500);
        assert_eq!(config.api.page, 1);
        assert_eq!(config.categories.len(), 3);
    }

    #[test]
    fn loads_yaml_by_extension() {
        let yaml = r#"
auth:
  user_agent: "offdb - test"
server:
  host: localhost
  port: 5433
database:
  name: off_yaml
  username: postgres
api:
  page_size: 20
categories:
  - Sweets
  - Cheese
"#;
        let (_dir, path) = write_config("config.yml", yaml);
        let config = load(&path).unwrap();

        assert_eq!(config.server.port, 5433);
        assert_eq!(config.database.name, "off_yaml");
        assert_eq!(config.api.page_size, 20);
        assert_eq!(config.api.country, "france");
        assert_eq!(config.categories, vec!["Sweets", "Cheese"]);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SetupError::ConfigRead { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let (_dir, path) = write_config("config.toml", "[auth\nuser_agent =");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, SetupError::ConfigParse { .. }));
    }

    #[test]
    fn env_password_overrides_file() {
        let mut config = sample();
        config.apply_env_overrides(|key| {
            (key == PASSWORD_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(config.database.password, "from-env");

        let mut untouched = sample();
        untouched.apply_env_overrides(|_| None);
        assert_eq!(untouched.database.password, "secret");
    }

    #[test]
    fn sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_empty_category_list() {
        let mut config = sample();
        config.categories.clear();
        assert!(matches!(config.validate(), Err(SetupError::Config(_))));
    }

    #[test]
    fn rejects_duplicate_and_blank_categories() {
        let mut config = sample();
        config.categories.push("Sweets".to_string());
        assert!(matches!(config.validate(), Err(SetupError::Config(_))));

        let mut config = sample();
        config.categories.push("  ".to_string());
        assert!(matches!(config.validate(), Err(SetupError::Config(_))));
    }

    #[test]
    fn rejects_unsafe_database_name() {
        let mut config = sample();
        config.database.name = "off\"; DROP DATABASE postgres; --".to_string();
        assert!(matches!(
            config.validate(),
            Err(SetupError::InvalidDatabaseName(_))
        ));
    }

    #[test]
    fn rejects_zero_page_size_and_empty_user_agent() {
        let mut config = sample();
        config.api.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.auth.user_agent = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_target_equal_to_admin_database() {
        let mut config = sample();
        config.database.name = "postgres".to_string();
        assert!(config.validate().is_err());
    }
}
