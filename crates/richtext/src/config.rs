//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::settings::Settings;

/// Process configuration for the `richtext` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Only the `migrate` command needs it.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    /// Path to the TOML settings file (from RICHTEXT_SETTINGS).
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let settings_path = env::var("RICHTEXT_SETTINGS").ok().map(PathBuf::from);

        Ok(Self {
            database_url,
            database_max_connections,
            settings_path,
        })
    }

    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL environment variable is required for this command")
    }

    /// Load settings from `settings_path`, or the defaults when unset.
    pub fn load_settings(&self) -> Result<Settings> {
        match &self.settings_path {
            Some(path) => Settings::load(path),
            None => Ok(Settings::default()),
        }
    }
}
