//! In-memory storage adapter
//!
//! Typed maps behind one async lock. The list indices are derived from the
//! maps, so `save_*_list` calls are accepted and ignored. Mostly used by
//! tests and tools; nothing survives the process.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::outbound::{
    DataSourcePort, EntityStub, StorageError, TownBlockStub,
};
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::value_objects::{
    BlockCoord, JailId, NationId, PersistState, PlotGroupId, ResidentId, TownBlockId, TownId,
    WorldId,
};

#[derive(Default)]
struct Store {
    worlds: HashMap<WorldId, World>,
    towns: HashMap<TownId, Town>,
    nations: HashMap<NationId, Nation>,
    residents: HashMap<ResidentId, Resident>,
    town_blocks: HashMap<TownBlockId, TownBlock>,
    plot_groups: HashMap<PlotGroupId, PlotGroup>,
    jails: HashMap<JailId, Jail>,
    hibernated: HashMap<Uuid, Resident>,
    regen_queue: Option<Vec<BlockCoord>>,
    snapshot_queue: Option<Vec<BlockCoord>>,
}

#[derive(Default)]
pub struct InMemoryDataSource {
    store: RwLock<Store>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Mimic a persisted round trip: the lifecycle marker is not a stored field
/// and always comes back at its default.
fn revive<T: Clone>(value: &T, set: impl FnOnce(&mut T)) -> T {
    let mut value = value.clone();
    set(&mut value);
    value
}

#[async_trait]
impl DataSourcePort for InMemoryDataSource {
    async fn backup(&self) -> Result<PathBuf, StorageError> {
        Ok(PathBuf::from(":memory:"))
    }

    async fn finish_tasks(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn world_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .worlds
            .values()
            .map(|w| EntityStub::new(w.id, w.name.clone()))
            .collect())
    }

    async fn town_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .towns
            .values()
            .map(|t| EntityStub::new(t.id, t.name.clone()))
            .collect())
    }

    async fn nation_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .nations
            .values()
            .map(|n| EntityStub::new(n.id, n.name.clone()))
            .collect())
    }

    async fn resident_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .residents
            .values()
            .map(|r| EntityStub::new(r.id, r.name.clone()))
            .collect())
    }

    async fn plot_group_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .plot_groups
            .values()
            .map(|g| EntityStub::new(g.id, g.name.clone()))
            .collect())
    }

    async fn jail_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .jails
            .values()
            .map(|j| EntityStub::new(j.id, j.name.clone()))
            .collect())
    }

    async fn town_block_list(&self) -> Result<Vec<TownBlockStub>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .town_blocks
            .values()
            .map(|b| TownBlockStub {
                id: b.id,
                coord: b.coord,
            })
            .collect())
    }

    // Indices are derived from the maps; accepting the writes keeps the
    // adapter drop-in for the save orchestrator.

    async fn save_world_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_town_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_nation_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_resident_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_plot_group_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_jail_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_town_block_list(&self, _stubs: &[TownBlockStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load_world(&self, id: WorldId) -> Result<World, StorageError> {
        let store = self.store.read().await;
        store
            .worlds
            .get(&id)
            .map(|w| revive(w, |w| w.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_world(&self, world: &World) -> Result<(), StorageError> {
        self.store.write().await.worlds.insert(world.id, world.clone());
        Ok(())
    }

    async fn delete_world(&self, id: WorldId) -> Result<(), StorageError> {
        self.store.write().await.worlds.remove(&id);
        Ok(())
    }

    async fn load_town(&self, id: TownId) -> Result<Town, StorageError> {
        let store = self.store.read().await;
        store
            .towns
            .get(&id)
            .map(|t| revive(t, |t| t.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_town(&self, town: &Town) -> Result<(), StorageError> {
        self.store.write().await.towns.insert(town.id, town.clone());
        Ok(())
    }

    async fn delete_town(&self, id: TownId) -> Result<(), StorageError> {
        self.store.write().await.towns.remove(&id);
        Ok(())
    }

    async fn load_nation(&self, id: NationId) -> Result<Nation, StorageError> {
        let store = self.store.read().await;
        store
            .nations
            .get(&id)
            .map(|n| revive(n, |n| n.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_nation(&self, nation: &Nation) -> Result<(), StorageError> {
        self.store
            .write()
            .await
            .nations
            .insert(nation.id, nation.clone());
        Ok(())
    }

    async fn delete_nation(&self, id: NationId) -> Result<(), StorageError> {
        self.store.write().await.nations.remove(&id);
        Ok(())
    }

    async fn load_resident(&self, id: ResidentId) -> Result<Resident, StorageError> {
        let store = self.store.read().await;
        store
            .residents
            .get(&id)
            .map(|r| revive(r, |r| r.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        self.store
            .write()
            .await
            .residents
            .insert(resident.id, resident.clone());
        Ok(())
    }

    async fn delete_resident(&self, id: ResidentId) -> Result<(), StorageError> {
        self.store.write().await.residents.remove(&id);
        Ok(())
    }

    async fn load_town_block(&self, id: TownBlockId) -> Result<TownBlock, StorageError> {
        let store = self.store.read().await;
        store
            .town_blocks
            .get(&id)
            .map(|b| revive(b, |b| b.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_town_block(&self, block: &TownBlock) -> Result<(), StorageError> {
        self.store
            .write()
            .await
            .town_blocks
            .insert(block.id, block.clone());
        Ok(())
    }

    async fn delete_town_block(&self, id: TownBlockId) -> Result<(), StorageError> {
        self.store.write().await.town_blocks.remove(&id);
        Ok(())
    }

    async fn load_plot_group(&self, id: PlotGroupId) -> Result<PlotGroup, StorageError> {
        let store = self.store.read().await;
        store
            .plot_groups
            .get(&id)
            .map(|g| revive(g, |g| g.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_plot_group(&self, group: &PlotGroup) -> Result<(), StorageError> {
        self.store
            .write()
            .await
            .plot_groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn delete_plot_group(&self, id: PlotGroupId) -> Result<(), StorageError> {
        self.store.write().await.plot_groups.remove(&id);
        Ok(())
    }

    async fn load_jail(&self, id: JailId) -> Result<Jail, StorageError> {
        let store = self.store.read().await;
        store
            .jails
            .get(&id)
            .map(|j| revive(j, |j| j.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_jail(&self, jail: &Jail) -> Result<(), StorageError> {
        self.store.write().await.jails.insert(jail.id, jail.clone());
        Ok(())
    }

    async fn delete_jail(&self, id: JailId) -> Result<(), StorageError> {
        self.store.write().await.jails.remove(&id);
        Ok(())
    }

    async fn hibernated_resident_list(&self) -> Result<Vec<Uuid>, StorageError> {
        let store = self.store.read().await;
        Ok(store.hibernated.keys().copied().collect())
    }

    async fn load_hibernated_resident(&self, player: Uuid) -> Result<Resident, StorageError> {
        let store = self.store.read().await;
        store
            .hibernated
            .get(&player)
            .map(|r| revive(r, |r| r.persist = PersistState::default()))
            .ok_or(StorageError::Missing)
    }

    async fn save_hibernated_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        let player = resident.player.ok_or_else(|| {
            StorageError::Corrupt("hibernated resident without platform account".to_string())
        })?;
        self.store
            .write()
            .await
            .hibernated
            .insert(player, resident.clone());
        Ok(())
    }

    async fn delete_hibernated_resident(&self, player: Uuid) -> Result<(), StorageError> {
        self.store.write().await.hibernated.remove(&player);
        Ok(())
    }

    async fn load_regen_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        let store = self.store.read().await;
        store.regen_queue.clone().ok_or(StorageError::Missing)
    }

    async fn save_regen_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.store.write().await.regen_queue = Some(queue.to_vec());
        Ok(())
    }

    async fn load_snapshot_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        let store = self.store.read().await;
        store.snapshot_queue.clone().ok_or(StorageError::Missing)
    }

    async fn save_snapshot_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.store.write().await.snapshot_queue = Some(queue.to_vec());
        Ok(())
    }
}
