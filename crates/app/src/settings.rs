//! Handles settings for the application.
//!
//! Values come from an optional `settings.toml` in the working directory and
//! are overridden by `SETTLEMENT__<SECTION>__<KEY>` environment variables,
//! e.g. `SETTLEMENT__SERVER__PORT=8080`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    /// Bearer token guarding the administrative routes.
    pub admin_token: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
    /// Pool size. Writers still run one at a time: each write transaction
    /// takes the SQLite write lock up front and the others wait for it.
    pub max_connections: u32,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite:./settlement.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settlement {
    /// Receiver share of an approved payment, in basis points.
    pub receiver_share_bps: u32,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Settlement {
    fn default() -> Self {
        Self {
            receiver_share_bps: engine::SplitRatio::DEFAULT.receiver_bps(),
            max_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub database: Database,
    pub settlement: Settlement,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_PATH).required(false))
            .add_source(
                Environment::with_prefix("SETTLEMENT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}
