//! Data source port - The polymorphic persistence contract
//!
//! One operation family per entity kind plus the bulk index ("list")
//! operations the load orchestrator builds its shells from. Implementations
//! differ only in storage medium; any of them must satisfy the round-trip
//! law: `save_x` followed by `load_x` on a fresh instance reconstructs an
//! entity equal in all persisted fields.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::value_objects::{
    BlockCoord, JailId, NationId, PlotGroupId, ResidentId, TownBlockId, TownId, WorldId,
};

/// Errors surfaced by a backing store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The record does not exist in the backing store.
    #[error("record not found")]
    Missing,

    /// The record exists but cannot be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backing store is unavailable or rejected the operation.
    #[error("storage failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// A name/id pair from a backing store's index, enough to register a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStub {
    pub id: Uuid,
    pub name: String,
}

impl EntityStub {
    pub fn new(id: impl Into<Uuid>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Index entry for a town block: identity plus its coordinate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownBlockStub {
    pub id: TownBlockId,
    pub coord: BlockCoord,
}

/// The persistence capability implemented by every backend adapter.
///
/// Load operations return owned values; installing them into the registry
/// and resolving their references is the load orchestrator's job, never the
/// backend's. Save operations are value-copy flushes of already-consistent
/// in-memory state.
#[async_trait]
pub trait DataSourcePort: Send + Sync {
    /// Produce a point-in-time copy of the entire backing store, returning
    /// where the copy landed. Must be called before any destructive bulk
    /// rewrite; failure aborts whatever migration required it.
    async fn backup(&self) -> Result<PathBuf, StorageError>;

    /// Drain anything the backend still has buffered. Callers must await
    /// this before process exit.
    async fn finish_tasks(&self) -> Result<(), StorageError>;

    // --- list indices (names/ids only) ---

    async fn world_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn town_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn nation_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn resident_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn plot_group_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn jail_list(&self) -> Result<Vec<EntityStub>, StorageError>;
    async fn town_block_list(&self) -> Result<Vec<TownBlockStub>, StorageError>;

    async fn save_world_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_town_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_nation_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_resident_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_plot_group_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_jail_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError>;
    async fn save_town_block_list(&self, stubs: &[TownBlockStub]) -> Result<(), StorageError>;

    // --- full records ---

    async fn load_world(&self, id: WorldId) -> Result<World, StorageError>;
    async fn save_world(&self, world: &World) -> Result<(), StorageError>;
    async fn delete_world(&self, id: WorldId) -> Result<(), StorageError>;

    async fn load_town(&self, id: TownId) -> Result<Town, StorageError>;
    async fn save_town(&self, town: &Town) -> Result<(), StorageError>;
    async fn delete_town(&self, id: TownId) -> Result<(), StorageError>;

    async fn load_nation(&self, id: NationId) -> Result<Nation, StorageError>;
    async fn save_nation(&self, nation: &Nation) -> Result<(), StorageError>;
    async fn delete_nation(&self, id: NationId) -> Result<(), StorageError>;

    async fn load_resident(&self, id: ResidentId) -> Result<Resident, StorageError>;
    async fn save_resident(&self, resident: &Resident) -> Result<(), StorageError>;
    async fn delete_resident(&self, id: ResidentId) -> Result<(), StorageError>;

    async fn load_town_block(&self, id: TownBlockId) -> Result<TownBlock, StorageError>;
    async fn save_town_block(&self, block: &TownBlock) -> Result<(), StorageError>;
    async fn delete_town_block(&self, id: TownBlockId) -> Result<(), StorageError>;

    async fn load_plot_group(&self, id: PlotGroupId) -> Result<PlotGroup, StorageError>;
    async fn save_plot_group(&self, group: &PlotGroup) -> Result<(), StorageError>;
    async fn delete_plot_group(&self, id: PlotGroupId) -> Result<(), StorageError>;

    async fn load_jail(&self, id: JailId) -> Result<Jail, StorageError>;
    async fn save_jail(&self, jail: &Jail) -> Result<(), StorageError>;
    async fn delete_jail(&self, id: JailId) -> Result<(), StorageError>;

    // --- hibernated residents (keyed by platform account) ---

    async fn hibernated_resident_list(&self) -> Result<Vec<Uuid>, StorageError>;
    async fn load_hibernated_resident(&self, player: Uuid) -> Result<Resident, StorageError>;
    async fn save_hibernated_resident(&self, resident: &Resident) -> Result<(), StorageError>;
    async fn delete_hibernated_resident(&self, player: Uuid) -> Result<(), StorageError>;

    // --- transient work queues (pending regeneration / snapshots) ---

    async fn load_regen_queue(&self) -> Result<Vec<BlockCoord>, StorageError>;
    async fn save_regen_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError>;
    async fn load_snapshot_queue(&self) -> Result<Vec<BlockCoord>, StorageError>;
    async fn save_snapshot_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError>;
}
