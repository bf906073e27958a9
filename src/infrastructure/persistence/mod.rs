//! Storage adapters - Creates data sources based on configuration
//!
//! Three adapters implement the same persistence contract: a volatile
//! in-memory store, a flat-file JSON store, and an embedded SQLite
//! database. The factory picks one from configuration; callers only ever
//! see the trait object.

mod flat_file;
mod memory;
mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::outbound::DataSourcePort;
use crate::infrastructure::config::{AppConfig, BackendKind};

pub use flat_file::FlatFileDataSource;
pub use memory::InMemoryDataSource;
pub use sqlite::SqliteDataSource;

/// Build the configured storage adapter.
pub async fn create_data_source(config: &AppConfig) -> Result<Arc<dyn DataSourcePort>> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(InMemoryDataSource::new())),
        BackendKind::FlatFile => {
            let source = FlatFileDataSource::open(&config.data_dir)
                .await
                .with_context(|| {
                    format!("opening flat-file store at {}", config.data_dir.display())
                })?;
            Ok(Arc::new(source))
        }
        BackendKind::Sqlite => {
            tokio::fs::create_dir_all(&config.data_dir)
                .await
                .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
            let path = config.data_dir.join("demesne.db");
            let source = SqliteDataSource::connect(&path)
                .await
                .with_context(|| format!("opening sqlite store at {}", path.display()))?;
            Ok(Arc::new(source))
        }
    }
}
