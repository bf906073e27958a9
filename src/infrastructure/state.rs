//! Shared application state

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::outbound::PresencePort;
use crate::application::services::{DataStore, QueryService};
use crate::application::Universe;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::persistence::create_data_source;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub universe: Arc<Universe>,
    pub store: Arc<DataStore>,
    pub query: Arc<QueryService>,
}

impl AppState {
    /// Wire up the configured backend, load the full graph, and expose the
    /// service surface. A load failure aborts startup.
    pub async fn new(config: AppConfig, presence: Arc<dyn PresencePort>) -> Result<Self> {
        let backend = create_data_source(&config).await?;
        let universe = Arc::new(Universe::new());
        let store = Arc::new(DataStore::new(Arc::clone(&universe), backend));

        store
            .load_all()
            .await
            .context("loading world graph from backing store")?;

        let query = Arc::new(QueryService::new(
            Arc::clone(&universe),
            presence,
            config.nation_zone_radius,
        ));

        Ok(Self {
            config,
            universe,
            store,
            query,
        })
    }
}
