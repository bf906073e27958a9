//! Universe - the explicitly constructed context object holding the graph
//!
//! One `Universe` owns the identity registries for all seven entity kinds,
//! the coordinate index for town blocks, the hibernated-resident set and the
//! transient work queues. It is created at startup, passed to every
//! component that needs it, and torn down at shutdown; there is no ambient
//! global instance.
//!
//! Locking discipline: the interior `RwLock` is held only for index
//! bookkeeping and is never held across `.await`. Entity handles are
//! `Arc<RwLock<T>>`; accessors take the universe lock, clone the handle,
//! release, then lock the entity. Code must not hold two entity locks at
//! once outside the structurally-serialized mutation operations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::application::registry::KindRegistry;
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::error::{EntityKind, GraphError};
use crate::domain::value_objects::{
    BlockCoord, JailId, NationId, PlotGroupId, ResidentId, TownBlockId, TownId, WorldId,
};

/// Shared handle to a single live entity.
pub type Handle<T> = Arc<RwLock<T>>;

#[derive(Default)]
struct Graph {
    worlds: KindRegistry<World>,
    towns: KindRegistry<Town>,
    nations: KindRegistry<Nation>,
    residents: KindRegistry<Resident>,
    jails: KindRegistry<Jail>,
    plot_groups: KindRegistry<PlotGroup>,
    town_blocks: HashMap<TownBlockId, Handle<TownBlock>>,
    block_coords: HashMap<BlockCoord, TownBlockId>,
    players: HashMap<Uuid, ResidentId>,
    hibernated: HashSet<Uuid>,
    regen_queue: Vec<BlockCoord>,
    snapshot_queue: Vec<BlockCoord>,
}

/// Entity counts per kind, for startup reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniverseCounts {
    pub worlds: usize,
    pub towns: usize,
    pub nations: usize,
    pub residents: usize,
    pub town_blocks: usize,
    pub jails: usize,
    pub plot_groups: usize,
}

#[derive(Default)]
pub struct Universe {
    graph: RwLock<Graph>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Graph> {
        self.graph.read().expect("lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Graph> {
        self.graph.write().expect("lock poisoned")
    }

    // --- worlds ---

    pub fn world(&self, name: &str) -> Option<Handle<World>> {
        self.read().worlds.get_by_name(name)
    }

    pub fn world_by_id(&self, id: WorldId) -> Option<Handle<World>> {
        self.read().worlds.get(id)
    }

    pub fn worlds(&self) -> Vec<Handle<World>> {
        self.read().worlds.all()
    }

    pub(crate) fn register_world(&self, world: World) -> Result<Handle<World>, GraphError> {
        self.write().worlds.register(world)
    }

    pub(crate) fn unregister_world(&self, id: WorldId) -> Option<Handle<World>> {
        self.write().worlds.remove(id)
    }

    // --- towns ---

    pub fn town(&self, name: &str) -> Option<Handle<Town>> {
        self.read().towns.get_by_name(name)
    }

    pub fn town_by_id(&self, id: TownId) -> Option<Handle<Town>> {
        self.read().towns.get(id)
    }

    pub fn towns(&self) -> Vec<Handle<Town>> {
        self.read().towns.all()
    }

    pub fn has_town(&self, name: &str) -> bool {
        self.read().towns.contains_name(name)
    }

    pub(crate) fn register_town(&self, town: Town) -> Result<Handle<Town>, GraphError> {
        self.write().towns.register(town)
    }

    pub(crate) fn unregister_town(&self, id: TownId) -> Option<Handle<Town>> {
        self.write().towns.remove(id)
    }

    pub(crate) fn rename_town(&self, id: TownId, new_name: &str) -> Result<(), GraphError> {
        self.write().towns.rename(id, new_name)
    }

    // --- nations ---

    pub fn nation(&self, name: &str) -> Option<Handle<Nation>> {
        self.read().nations.get_by_name(name)
    }

    pub fn nation_by_id(&self, id: NationId) -> Option<Handle<Nation>> {
        self.read().nations.get(id)
    }

    pub fn nations(&self) -> Vec<Handle<Nation>> {
        self.read().nations.all()
    }

    pub fn has_nation(&self, name: &str) -> bool {
        self.read().nations.contains_name(name)
    }

    pub(crate) fn register_nation(&self, nation: Nation) -> Result<Handle<Nation>, GraphError> {
        self.write().nations.register(nation)
    }

    pub(crate) fn unregister_nation(&self, id: NationId) -> Option<Handle<Nation>> {
        self.write().nations.remove(id)
    }

    pub(crate) fn rename_nation(&self, id: NationId, new_name: &str) -> Result<(), GraphError> {
        self.write().nations.rename(id, new_name)
    }

    // --- residents ---

    pub fn resident(&self, name: &str) -> Option<Handle<Resident>> {
        self.read().residents.get_by_name(name)
    }

    pub fn resident_by_id(&self, id: ResidentId) -> Option<Handle<Resident>> {
        self.read().residents.get(id)
    }

    /// Resolve a resident from a stable platform account id.
    pub fn resident_by_player(&self, player: Uuid) -> Option<Handle<Resident>> {
        let graph = self.read();
        let id = graph.players.get(&player)?;
        graph.residents.get(*id)
    }

    pub fn residents(&self) -> Vec<Handle<Resident>> {
        self.read().residents.all()
    }

    pub fn has_resident(&self, name: &str) -> bool {
        self.read().residents.contains_name(name)
    }

    pub(crate) fn register_resident(
        &self,
        resident: Resident,
    ) -> Result<Handle<Resident>, GraphError> {
        let player = resident.player;
        let id = resident.id;
        let mut graph = self.write();
        let handle = graph.residents.register(resident)?;
        if let Some(player) = player {
            graph.players.insert(player, id);
        }
        Ok(handle)
    }

    pub(crate) fn unregister_resident(&self, id: ResidentId) -> Option<Handle<Resident>> {
        let mut graph = self.write();
        let handle = graph.residents.remove(id)?;
        if let Some(player) = handle.read().expect("lock poisoned").player {
            graph.players.remove(&player);
        }
        Some(handle)
    }

    pub(crate) fn rename_resident(&self, id: ResidentId, new_name: &str) -> Result<(), GraphError> {
        self.write().residents.rename(id, new_name)
    }

    /// Attach a platform account to an already-registered resident.
    pub(crate) fn index_player(&self, player: Uuid, id: ResidentId) {
        self.write().players.insert(player, id);
    }

    // --- town blocks ---

    pub fn town_block(&self, id: TownBlockId) -> Option<Handle<TownBlock>> {
        self.read().town_blocks.get(&id).cloned()
    }

    pub fn town_block_at(&self, coord: BlockCoord) -> Option<Handle<TownBlock>> {
        let graph = self.read();
        let id = graph.block_coords.get(&coord)?;
        graph.town_blocks.get(id).cloned()
    }

    pub fn town_blocks(&self) -> Vec<Handle<TownBlock>> {
        self.read().town_blocks.values().cloned().collect()
    }

    pub fn has_town_block_at(&self, coord: BlockCoord) -> bool {
        self.read().block_coords.contains_key(&coord)
    }

    pub(crate) fn register_town_block(
        &self,
        block: TownBlock,
    ) -> Result<Handle<TownBlock>, GraphError> {
        let mut graph = self.write();
        if graph.block_coords.contains_key(&block.coord) {
            return Err(GraphError::AlreadyRegistered {
                kind: EntityKind::TownBlock,
                name: block.coord.to_string(),
            });
        }
        if graph.town_blocks.contains_key(&block.id) {
            return Err(GraphError::AlreadyRegistered {
                kind: EntityKind::TownBlock,
                name: block.id.to_string(),
            });
        }
        let id = block.id;
        let coord = block.coord;
        let handle = Arc::new(RwLock::new(block));
        graph.block_coords.insert(coord, id);
        graph.town_blocks.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    pub(crate) fn unregister_town_block(&self, id: TownBlockId) -> Option<Handle<TownBlock>> {
        let mut graph = self.write();
        let handle = graph.town_blocks.remove(&id)?;
        let coord = handle.read().expect("lock poisoned").coord;
        graph.block_coords.remove(&coord);
        Some(handle)
    }

    // --- jails ---

    pub fn jail(&self, name: &str) -> Option<Handle<Jail>> {
        self.read().jails.get_by_name(name)
    }

    pub fn jail_by_id(&self, id: JailId) -> Option<Handle<Jail>> {
        self.read().jails.get(id)
    }

    pub fn jails(&self) -> Vec<Handle<Jail>> {
        self.read().jails.all()
    }

    pub(crate) fn register_jail(&self, jail: Jail) -> Result<Handle<Jail>, GraphError> {
        self.write().jails.register(jail)
    }

    pub(crate) fn unregister_jail(&self, id: JailId) -> Option<Handle<Jail>> {
        self.write().jails.remove(id)
    }

    // --- plot groups ---

    pub fn plot_group(&self, name: &str) -> Option<Handle<PlotGroup>> {
        self.read().plot_groups.get_by_name(name)
    }

    pub fn plot_group_by_id(&self, id: PlotGroupId) -> Option<Handle<PlotGroup>> {
        self.read().plot_groups.get(id)
    }

    pub fn plot_groups(&self) -> Vec<Handle<PlotGroup>> {
        self.read().plot_groups.all()
    }

    pub(crate) fn register_plot_group(
        &self,
        group: PlotGroup,
    ) -> Result<Handle<PlotGroup>, GraphError> {
        self.write().plot_groups.register(group)
    }

    pub(crate) fn unregister_plot_group(&self, id: PlotGroupId) -> Option<Handle<PlotGroup>> {
        self.write().plot_groups.remove(id)
    }

    pub(crate) fn rename_plot_group(
        &self,
        id: PlotGroupId,
        new_name: &str,
    ) -> Result<(), GraphError> {
        self.write().plot_groups.rename(id, new_name)
    }

    // --- hibernated residents ---

    pub fn hibernated_residents(&self) -> Vec<Uuid> {
        self.read().hibernated.iter().copied().collect()
    }

    pub fn is_hibernated(&self, player: Uuid) -> bool {
        self.read().hibernated.contains(&player)
    }

    pub(crate) fn add_hibernated(&self, player: Uuid) {
        self.write().hibernated.insert(player);
    }

    pub(crate) fn remove_hibernated(&self, player: Uuid) {
        self.write().hibernated.remove(&player);
    }

    // --- transient work queues ---

    pub fn push_regen(&self, coord: BlockCoord) {
        self.write().regen_queue.push(coord);
    }

    pub fn regen_queue(&self) -> Vec<BlockCoord> {
        self.read().regen_queue.clone()
    }

    pub(crate) fn set_regen_queue(&self, queue: Vec<BlockCoord>) {
        self.write().regen_queue = queue;
    }

    pub fn push_snapshot(&self, coord: BlockCoord) {
        self.write().snapshot_queue.push(coord);
    }

    pub fn snapshot_queue(&self) -> Vec<BlockCoord> {
        self.read().snapshot_queue.clone()
    }

    pub(crate) fn set_snapshot_queue(&self, queue: Vec<BlockCoord>) {
        self.write().snapshot_queue = queue;
    }

    // --- bookkeeping ---

    pub fn counts(&self) -> UniverseCounts {
        let graph = self.read();
        UniverseCounts {
            worlds: graph.worlds.len(),
            towns: graph.towns.len(),
            nations: graph.nations.len(),
            residents: graph.residents.len(),
            town_blocks: graph.town_blocks.len(),
            jails: graph.jails.len(),
            plot_groups: graph.plot_groups.len(),
        }
    }

    /// Drop every registration of one kind. Used by the load orchestrator to
    /// roll back the kinds whose record phase did not complete.
    pub(crate) fn clear_kind(&self, kind: EntityKind) {
        let mut graph = self.write();
        match kind {
            EntityKind::World => graph.worlds.clear(),
            EntityKind::Town => graph.towns.clear(),
            EntityKind::Nation => graph.nations.clear(),
            EntityKind::Resident => {
                graph.residents.clear();
                graph.players.clear();
            }
            EntityKind::TownBlock => {
                graph.town_blocks.clear();
                graph.block_coords.clear();
            }
            EntityKind::Jail => graph.jails.clear(),
            EntityKind::PlotGroup => graph.plot_groups.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_town_block_coord_index_rejects_double_claim() {
        let universe = Universe::new();
        let world = World::new("overworld");
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let coord = BlockCoord::new(world_id, 4, -4);
        universe.register_town_block(TownBlock::new(coord)).unwrap();

        let err = universe
            .register_town_block(TownBlock::new(coord))
            .unwrap_err();
        assert!(matches!(err, GraphError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_player_index_follows_resident_lifecycle() {
        let universe = Universe::new();
        let player = Uuid::new_v4();
        let resident = Resident::new("bob").with_player(player);
        let id = resident.id;
        universe.register_resident(resident).unwrap();

        assert!(universe.resident_by_player(player).is_some());
        universe.unregister_resident(id);
        assert!(universe.resident_by_player(player).is_none());
    }

    #[test]
    fn test_counts_reflect_registrations() {
        let universe = Universe::new();
        universe.register_world(World::new("w")).unwrap();
        universe.register_town(Town::new("t")).unwrap();

        let counts = universe.counts();
        assert_eq!(counts.worlds, 1);
        assert_eq!(counts.towns, 1);
        assert_eq!(counts.nations, 0);
    }
}
