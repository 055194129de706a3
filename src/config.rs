use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::ErrorKind;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Upper bound for a single repository call.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_store_timeout() -> u64 {
    5
}

impl Config {
    /// Reads `CONFIG_PATH` (default `config.toml`), falling back to environment
    /// variables when the file does not exist. Environment variables always win.
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        let file = match std::fs::read_to_string(&config_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "cannot read config file {config_path}: {e}"
                )));
            }
        };

        Self::load(file.as_deref(), |name| env::var(name).ok())
    }

    pub fn load(file: Option<&str>, get_env: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = match file {
            Some(content) => toml::from_str::<Config>(content)
                .map_err(|e| AppError::ConfigError(format!("cannot parse config file: {e}")))?,
            None => Config {
                server: ServerConfig {
                    host: "127.0.0.1".to_string(),
                    port: 11682,
                    shutdown_timeout_secs: default_shutdown_timeout(),
                },
                database: DatabaseConfig {
                    url: postgres_url_from_parts(&get_env),
                    max_connections: 10,
                    connect_timeout_secs: default_connect_timeout(),
                    store_timeout_secs: default_store_timeout(),
                },
                log: LogConfig::default(),
            },
        };

        if let Some(v) = get_env("SERVER_HOST") {
            config.server.host = v;
        }
        if let Some(p) = parse_env(&get_env, "SERVER_PORT") {
            config.server.port = p;
        }
        if let Some(n) = parse_env(&get_env, "SHUTDOWN_TIMEOUT_SECS") {
            config.server.shutdown_timeout_secs = n;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            config.database.url = v;
        }
        if let Some(n) = parse_env(&get_env, "DB_MAX_CONNECTIONS") {
            config.database.max_connections = n;
        }
        if let Some(n) = parse_env(&get_env, "DB_CONNECT_TIMEOUT_SECS") {
            config.database.connect_timeout_secs = n;
        }
        if let Some(n) = parse_env(&get_env, "STORE_TIMEOUT_SECS") {
            config.database.store_timeout_secs = n;
        }
        if let Some(v) = get_env("LOG_LEVEL") {
            config.log.level = v;
        }
        config.log.level = normalize_log_level(&config.log.level);

        if config.database.store_timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "store_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Maps a configured level onto an `env_logger` filter. `WARNING` is accepted
/// as an alias of `warn`; anything unknown falls back to `info`.
fn normalize_log_level(raw: &str) -> String {
    let level = raw.trim().to_ascii_lowercase();
    match level.as_str() {
        "warning" => "warn".to_string(),
        "error" | "warn" | "info" | "debug" | "trace" => level,
        _ => "info".to_string(),
    }
}

fn parse_env<T: FromStr>(get_env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

fn postgres_url_from_parts(get_env: &impl Fn(&str) -> Option<String>) -> String {
    let var = |name: &str, default: &str| get_env(name).unwrap_or_else(|| default.to_string());
    format!(
        "postgresql://{}:{}@{}:{}/{}",
        var("PG_USER", "postgres"),
        var("PG_PASSWORD", "postgres"),
        var("PG_HOST", "localhost"),
        var("PG_PORT", "5432"),
        var("PG_DATABASE", "aggregation"),
    )
}
