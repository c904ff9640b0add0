use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::health::ImportOptions;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub liftlog: LiftlogConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Liftlog-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LiftlogConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Health export import tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Bytes read from the export per iteration
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
    /// Carry-over may grow to this many chunks before the import is aborted
    #[serde(default = "default_max_carry_over_chunks")]
    pub max_carry_over_chunks: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size_bytes(),
            max_carry_over_chunks: default_max_carry_over_chunks(),
        }
    }
}

impl ImportConfig {
    /// Build scanner options for one import call
    pub fn to_options(&self) -> ImportOptions {
        ImportOptions {
            chunk_size: self.chunk_size_bytes,
            max_carry_over_chunks: self.max_carry_over_chunks,
            cancel: None,
        }
    }
}

fn default_chunk_size_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_carry_over_chunks() -> usize {
    4
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in LIFTLOG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("LIFTLOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.liftlog.db_path.as_os_str().is_empty() {
            anyhow::bail!("liftlog.db_path must not be empty");
        }

        if self.import.chunk_size_bytes == 0 {
            anyhow::bail!("import.chunk_size_bytes must be greater than 0");
        }

        if self.import.max_carry_over_chunks == 0 {
            anyhow::bail!("import.max_carry_over_chunks must be at least 1");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.liftlog.db_path
    }

    /// Get the SQL migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.liftlog.migrations_dir
    }
}
