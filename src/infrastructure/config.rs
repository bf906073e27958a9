//! Application configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Which storage adapter backs the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Volatile in-process store, for tools and tests.
    Memory,
    /// One JSON file per record under a data directory.
    FlatFile,
    /// Single-file embedded SQLite database.
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "flatfile" | "flat-file" | "json" => Ok(BackendKind::FlatFile),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => anyhow::bail!("unknown storage backend '{other}'"),
        }
    }
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Storage adapter selection
    pub backend: BackendKind,
    /// Root directory for flat-file data or the SQLite database file
    pub data_dir: PathBuf,
    /// Seconds between full save sweeps
    pub save_interval_secs: u64,
    /// Seconds between work-queue flushes
    pub queue_save_interval_secs: u64,
    /// Chebyshev radius of the zone around each capital's home block;
    /// zero disables nation zones
    pub nation_zone_radius: u32,
    /// Days a townless resident may stay offline before hibernation
    pub resident_retention_days: i64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            backend: env::var("DEMESNE_BACKEND")
                .unwrap_or_else(|_| "flatfile".to_string())
                .parse()
                .context("DEMESNE_BACKEND must be memory, flatfile or sqlite")?,
            data_dir: env::var("DEMESNE_DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            save_interval_secs: env::var("DEMESNE_SAVE_INTERVAL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .context("DEMESNE_SAVE_INTERVAL_SECS must be a number of seconds")?,
            queue_save_interval_secs: env::var("DEMESNE_QUEUE_SAVE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("DEMESNE_QUEUE_SAVE_INTERVAL_SECS must be a number of seconds")?,
            nation_zone_radius: env::var("DEMESNE_NATION_ZONE_RADIUS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .context("DEMESNE_NATION_ZONE_RADIUS must be a block radius")?,
            resident_retention_days: env::var("DEMESNE_RESIDENT_RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("DEMESNE_RESIDENT_RETENTION_DAYS must be a number of days")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parses_aliases() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!(
            "flat-file".parse::<BackendKind>().unwrap(),
            BackendKind::FlatFile
        );
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("postgres".parse::<BackendKind>().is_err());
    }
}
