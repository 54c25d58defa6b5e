// src/config.rs

use std::env;
use tracing::debug;

use crate::fetch::SocrataAuth;
use crate::load::ClickHouseAuth;

pub const DEFAULT_CLICKHOUSE_URL: &str = "http://localhost:8123";

/// Credentials and endpoints, read from the environment (and `.env`, if present).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub socrata: SocrataAuth,
    pub clickhouse_url: String,
    pub clickhouse: ClickHouseAuth,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        match dotenv::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(_) => debug!("no .env file"),
        }
        Self::from_vars()
    }

    fn from_vars() -> Self {
        Self {
            socrata: SocrataAuth {
                app_token: var("SOCRATA_APP_TOKEN"),
                username: var("SOCRATA_U_NAME"),
                password: var("SOCRATA_PASS"),
            },
            clickhouse_url: var("CLICKHOUSE_URL")
                .unwrap_or_else(|| DEFAULT_CLICKHOUSE_URL.to_string()),
            clickhouse: ClickHouseAuth {
                username: var("CLICKHOUSE_U_NAME"),
                password: var("CLICKHOUSE_PASS"),
            },
        }
    }
}
