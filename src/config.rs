use std::env;
use std::path::PathBuf;
use thiserror::Error;

// Runtime settings, read once from the environment (and .env via dotenv)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub max_connections: u32,
    pub scraping_json_dir: PathBuf,
    pub remove_on_update: bool,
    pub session_ttl_minutes: i64,
    pub session_remember_days: i64,
}

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Split out so tests can feed values without touching process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError("DATABASE_URL must be set".into()))?;

        let server_address = lookup("SERVER_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into());
        let max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?;
        let scraping_json_dir = lookup("SCRAPING_JSON_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("scraping/json"));
        let remove_on_update = lookup("ASSOCIATION_REMOVE_ON_UPDATE").as_deref() == Some("1");
        let session_ttl_minutes = parse_or("SESSION_TTL_MINUTES", lookup("SESSION_TTL_MINUTES"), 30)?;
        let session_remember_days =
            parse_or("SESSION_REMEMBER_DAYS", lookup("SESSION_REMEMBER_DAYS"), 10)?;

        Ok(Config {
            database_url,
            server_address,
            max_connections,
            scraping_json_dir,
            remove_on_update,
            session_ttl_minutes,
            session_remember_days,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError(format!("{} has an invalid value: {}", key, value))),
    }
}
