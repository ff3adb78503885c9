use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::ingest::DEFAULT_MAX_DATASETS_PER_USER;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Absent means the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub media_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_datasets_per_user: usize,
    pub seed_demo_data: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_or(key, default)
        .parse()
        .with_context(|| format!("Invalid value for {key}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig {
                port: parse_env("PORT", "3000")?,
                host: env_or("HOST", "0.0.0.0"),
                cors_allowed_origins: env_or("ALLOWED_ORIGINS", "http://localhost:3000,http://localhost:5173")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                max_connections: parse_env("DB_MAX_CONNECTIONS", "10")?,
                min_connections: parse_env("DB_MIN_CONNECTIONS", "1")?,
            },
            storage: StorageConfig {
                media_root: PathBuf::from(env_or("MEDIA_ROOT", "./media")),
            },
            ingest: IngestConfig {
                max_datasets_per_user: parse_env(
                    "MAX_DATASETS_PER_USER",
                    &DEFAULT_MAX_DATASETS_PER_USER.to_string(),
                )?,
                seed_demo_data: parse_env("SEED_DEMO_DATA", "false")?,
            },
        };

        if config.ingest.max_datasets_per_user == 0 {
            anyhow::bail!("MAX_DATASETS_PER_USER must be at least 1");
        }

        Ok(config)
    }

    /// Defaults suitable for tests: in-memory store, media under `media_root`.
    #[cfg(test)]
    pub fn for_tests(media_root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 1,
            },
            storage: StorageConfig {
                media_root: media_root.into(),
            },
            ingest: IngestConfig {
                max_datasets_per_user: DEFAULT_MAX_DATASETS_PER_USER,
                seed_demo_data: false,
            },
        }
    }
}
