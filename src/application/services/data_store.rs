//! Data store - the write path over the universe and one backend
//!
//! Every structural operation (create, delete, rename, merge, bulk load,
//! bulk save) serializes on one mutex so a bulk sweep never observes a
//! half-finished create/delete and vice versa. Routine per-entity field
//! reads and writes go straight through the entity handles and do not take
//! this lock.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::application::ports::outbound::{DataSourcePort, StorageError};
use crate::application::universe::{Handle, Universe};
use crate::domain::entities::{Nation, Resident, Town};
use crate::domain::error::{EntityKind, GraphError};
use uuid::Uuid;

pub struct DataStore {
    pub(super) universe: Arc<Universe>,
    pub(super) backend: Arc<dyn DataSourcePort>,
    pub(super) structural: Mutex<()>,
}

impl DataStore {
    pub fn new(universe: Arc<Universe>, backend: Arc<dyn DataSourcePort>) -> Self {
        Self {
            universe,
            backend,
            structural: Mutex::new(()),
        }
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Point-in-time copy of the entire backing store. Call before any
    /// destructive bulk rewrite; a failure here must abort that rewrite.
    pub async fn backup(&self) -> Result<PathBuf, StorageError> {
        let _guard = self.structural.lock().await;
        let path = self.backend.backup().await?;
        info!(path = %path.display(), "Backing store copied");
        Ok(path)
    }

    /// Drain buffered backend writes. Await this once after the final
    /// `save_all` before process exit.
    pub async fn finish_tasks(&self) -> Result<(), StorageError> {
        let _guard = self.structural.lock().await;
        self.backend.finish_tasks().await?;
        info!("Backend tasks drained");
        Ok(())
    }

    // --- legacy accessor surface ---
    //
    // Retained for integrations that predate the id-routed registry; each
    // is a thin adapter over the Universe lookups, never a second source
    // of truth.

    #[deprecated(note = "use Universe::resident instead")]
    pub fn get_resident(&self, name: &str) -> Result<Handle<Resident>, GraphError> {
        self.universe
            .resident(name)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Resident, name))
    }

    #[deprecated(note = "use Universe::town instead")]
    pub fn get_town(&self, name: &str) -> Result<Handle<Town>, GraphError> {
        self.universe
            .town(name)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Town, name))
    }

    #[deprecated(note = "use Universe::town_by_id instead")]
    pub fn get_town_by_uuid(&self, uuid: Uuid) -> Result<Handle<Town>, GraphError> {
        self.universe
            .town_by_id(uuid.into())
            .ok_or_else(|| GraphError::not_registered(EntityKind::Town, uuid.to_string()))
    }

    #[deprecated(note = "use Universe::nation instead")]
    pub fn get_nation(&self, name: &str) -> Result<Handle<Nation>, GraphError> {
        self.universe
            .nation(name)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Nation, name))
    }

    #[deprecated(note = "use Universe::nation_by_id instead")]
    pub fn get_nation_by_uuid(&self, uuid: Uuid) -> Result<Handle<Nation>, GraphError> {
        self.universe
            .nation_by_id(uuid.into())
            .ok_or_else(|| GraphError::not_registered(EntityKind::Nation, uuid.to_string()))
    }

    #[deprecated(note = "use Universe::has_town instead")]
    pub fn has_town_named(&self, name: &str) -> bool {
        self.universe.has_town(name)
    }

    #[deprecated(note = "use Universe::has_nation instead")]
    pub fn has_nation_named(&self, name: &str) -> bool {
        self.universe.has_nation(name)
    }
}
