use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use tracing::info;

pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub max_connections: u32,
    pub channel_capacity: usize,
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn load() -> anyhow::Result<Self> {
        if dotenv::dotenv().is_ok() {
            info!(".env loaded");
        }

        Ok(Self {
            bind_addr: try_load("CAMPFIRE_BIND", "0.0.0.0:8080")?,
            database_url: try_load("DATABASE_URL", "sqlite://campfire.db?mode=rwc")?,
            max_connections: try_load("CAMPFIRE_MAX_CONNECTIONS", "16")?,
            channel_capacity: try_load("CAMPFIRE_CHANNEL_CAPACITY", "64")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = dotenv::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}
