//! Mutation operations - the only write path into the graph
//!
//! Each operation validates against current state, applies the full set of
//! in-memory edits (both sides of every mutual reference), and only then
//! flushes the touched entities. Validation failures leave the graph
//! untouched; persistence failures after the in-memory commit are logged
//! and leave the entity dirty for the next bulk sweep.
//!
//! Public operations take the structural mutex on entry. The `_inner`
//! helpers assume it is already held - they exist so cascades (town
//! deletion emptying a nation, a roster removal emptying a town) run
//! inside the caller's critical section.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::outbound::StorageError;
use crate::application::services::DataStore;
use crate::application::universe::Handle;
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::error::{EntityKind, GraphError};
use crate::domain::value_objects::{
    validate_name, BlockCoord, JailId, NationId, PersistState, PlotGroupId, Position, ResidentId,
    TownBlockId, TownId, WorldId,
};

/// Error from an operation that must write through to the backing store
/// before its in-memory effect can commit (hibernate/wake).
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DataStore {
    // --- creation ---

    pub async fn new_world(&self, name: &str) -> Result<Handle<World>, GraphError> {
        validate_name(EntityKind::World, name)?;
        let _guard = self.structural.lock().await;
        let handle = self.universe.register_world(World::new(name))?;
        info!(world = name, "Registered world");
        self.persist_world(&handle).await;
        self.save_world_index().await;
        Ok(handle)
    }

    pub async fn new_town(&self, name: &str) -> Result<Handle<Town>, GraphError> {
        validate_name(EntityKind::Town, name)?;
        let _guard = self.structural.lock().await;
        let handle = self.universe.register_town(Town::new(name))?;
        info!(town = name, "Registered town");
        self.persist_town(&handle).await;
        self.save_town_index().await;
        Ok(handle)
    }

    pub async fn new_resident(
        &self,
        name: &str,
        player: Option<Uuid>,
    ) -> Result<Handle<Resident>, GraphError> {
        validate_name(EntityKind::Resident, name)?;
        let _guard = self.structural.lock().await;
        if let Some(player) = player {
            if self.universe.resident_by_player(player).is_some() {
                return Err(GraphError::violation(format!(
                    "platform account {player} already has a resident"
                )));
            }
        }
        let mut resident = Resident::new(name);
        if let Some(player) = player {
            resident = resident.with_player(player);
        }
        let handle = self.universe.register_resident(resident)?;
        info!(resident = name, "Registered resident");
        self.persist_resident(&handle).await;
        self.save_resident_index().await;
        Ok(handle)
    }

    pub async fn new_npc(&self, name: &str) -> Result<Handle<Resident>, GraphError> {
        validate_name(EntityKind::Resident, name)?;
        let _guard = self.structural.lock().await;
        let handle = self.universe.register_resident(Resident::new(name).as_npc())?;
        info!(resident = name, "Registered NPC resident");
        self.persist_resident(&handle).await;
        self.save_resident_index().await;
        Ok(handle)
    }

    /// Found a nation. The capital town joins at creation; a nation never
    /// exists without at least its capital.
    pub async fn new_nation(
        &self,
        name: &str,
        capital: TownId,
    ) -> Result<Handle<Nation>, GraphError> {
        validate_name(EntityKind::Nation, name)?;
        let _guard = self.structural.lock().await;
        let town = self.live_town(capital)?;
        {
            let town = town.read().expect("lock poisoned");
            if town.has_nation() {
                return Err(GraphError::violation(format!(
                    "town '{}' already belongs to a nation",
                    town.name
                )));
            }
        }
        let handle = self.universe.register_nation(Nation::new(name, capital))?;
        let nation_id = handle.read().expect("lock poisoned").id;
        {
            let mut town = town.write().expect("lock poisoned");
            town.nation = Some(nation_id);
            town.persist = PersistState::Dirty;
        }
        info!(nation = name, "Registered nation");
        self.persist_nation(&handle).await;
        self.persist_town(&town).await;
        self.save_nation_index().await;
        Ok(handle)
    }

    // --- claims ---

    /// Claim a coordinate for a town. The first claim becomes the home
    /// block automatically.
    pub async fn claim_block(
        &self,
        town_id: TownId,
        coord: BlockCoord,
    ) -> Result<Handle<TownBlock>, GraphError> {
        let _guard = self.structural.lock().await;
        let town = self.live_town(town_id)?;
        let world = self
            .universe
            .world_by_id(coord.world)
            .ok_or_else(|| GraphError::not_registered(EntityKind::World, coord.world.to_string()))?;
        {
            let world = world.read().expect("lock poisoned");
            if !world.claims_enabled {
                return Err(GraphError::violation(format!(
                    "claims are disabled in world '{}'",
                    world.name
                )));
            }
        }

        // A registered wilderness block (left over from a load) is reused;
        // an owned block is a conflict.
        let handle = match self.universe.town_block_at(coord) {
            Some(existing) => {
                let mut block = existing.write().expect("lock poisoned");
                if block.town.is_some() {
                    return Err(GraphError::AlreadyRegistered {
                        kind: EntityKind::TownBlock,
                        name: coord.to_string(),
                    });
                }
                block.town = Some(town_id);
                block.persist = PersistState::Dirty;
                drop(block);
                existing
            }
            None => {
                let mut block = TownBlock::new(coord);
                block.town = Some(town_id);
                self.universe.register_town_block(block)?
            }
        };

        let block_id = handle.read().expect("lock poisoned").id;
        {
            let mut town = town.write().expect("lock poisoned");
            town.town_blocks.push(block_id);
            if town.home_block.is_none() {
                town.home_block = Some(block_id);
            }
            town.persist = PersistState::Dirty;
        }
        debug!(block = %coord, "Claimed town block");
        self.persist_town_block(&handle).await;
        self.persist_town(&town).await;
        self.save_town_block_index().await;
        Ok(handle)
    }

    /// Release a claimed coordinate back to wilderness. The block record is
    /// removed outright; its plot group membership and any home-block role
    /// go with it.
    pub async fn unclaim_block(&self, coord: BlockCoord) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let handle = self
            .universe
            .town_block_at(coord)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, coord.to_string()))?;
        let (block_id, town_id, group_id) = {
            let block = handle.read().expect("lock poisoned");
            let town = block
                .town
                .ok_or_else(|| GraphError::violation(format!("block {coord} is not claimed")))?;
            (block.id, town, block.plot_group)
        };

        if let Some(town) = self.universe.town_by_id(town_id) {
            {
                let mut town = town.write().expect("lock poisoned");
                town.town_blocks.retain(|id| *id != block_id);
                if town.home_block == Some(block_id) {
                    town.home_block = None;
                    town.spawn = None;
                }
                town.persist = PersistState::Dirty;
            }
            self.persist_town(&town).await;
        }
        if let Some(group_id) = group_id {
            self.drop_block_from_group_inner(group_id, block_id).await;
        }
        self.drop_block_from_jails_inner(block_id).await;

        self.universe.unregister_town_block(block_id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_town_block(block_id).await {
            warn!(block = %coord, "Could not delete town block: {err}");
        }
        debug!(block = %coord, "Unclaimed town block");
        self.save_town_block_index().await;
        Ok(())
    }

    // --- membership ---

    pub async fn add_resident_to_town(
        &self,
        resident_id: ResidentId,
        town_id: TownId,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let resident = self.live_resident(resident_id)?;
        let town = self.live_town(town_id)?;
        {
            let resident = resident.read().expect("lock poisoned");
            if resident.has_town() {
                return Err(GraphError::violation(format!(
                    "resident '{}' already belongs to a town",
                    resident.name
                )));
            }
        }
        {
            let mut town = town.write().expect("lock poisoned");
            town.residents.push(resident_id);
            town.persist = PersistState::Dirty;
        }
        {
            let mut resident = resident.write().expect("lock poisoned");
            resident.town = Some(town_id);
            resident.persist = PersistState::Dirty;
        }
        self.persist_resident(&resident).await;
        self.persist_town(&town).await;
        Ok(())
    }

    /// Remove a resident from their town. Blocks they personally own revert
    /// to plain town blocks; a town left with no residents is deleted.
    pub async fn remove_resident_from_town(
        &self,
        resident_id: ResidentId,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.remove_resident_from_town_inner(resident_id).await
    }

    async fn remove_resident_from_town_inner(
        &self,
        resident_id: ResidentId,
    ) -> Result<(), GraphError> {
        let resident = self.live_resident(resident_id)?;
        let (name, town_id) = {
            let resident = resident.read().expect("lock poisoned");
            let town = resident.town.ok_or_else(|| {
                GraphError::violation(format!(
                    "resident '{}' does not belong to a town",
                    resident.name
                ))
            })?;
            (resident.name.clone(), town)
        };
        let town = self.live_town(town_id)?;

        let (block_ids, now_empty) = {
            let mut town = town.write().expect("lock poisoned");
            town.residents.retain(|id| *id != resident_id);
            town.persist = PersistState::Dirty;
            (town.town_blocks.clone(), town.residents.is_empty())
        };
        for block_id in block_ids {
            if let Some(block) = self.universe.town_block(block_id) {
                let owned = {
                    let mut block = block.write().expect("lock poisoned");
                    if block.resident == Some(resident_id) {
                        block.resident = None;
                        block.persist = PersistState::Dirty;
                        true
                    } else {
                        false
                    }
                };
                if owned {
                    self.persist_town_block(&block).await;
                }
            }
        }
        {
            let mut resident = resident.write().expect("lock poisoned");
            resident.town = None;
            resident.persist = PersistState::Dirty;
        }
        self.persist_resident(&resident).await;

        if now_empty {
            info!(town = %town.read().expect("lock poisoned").name, "Last resident left, deleting town");
            self.delete_town_inner(town_id).await?;
        } else {
            self.persist_town(&town).await;
        }
        debug!(resident = %name, "Resident left town");
        Ok(())
    }

    /// Assign or clear the personal owner of a claimed block. An owner must
    /// be a member of the owning town.
    pub async fn set_block_resident(
        &self,
        coord: BlockCoord,
        resident_id: Option<ResidentId>,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let handle = self
            .universe
            .town_block_at(coord)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, coord.to_string()))?;
        let town_id = handle
            .read()
            .expect("lock poisoned")
            .town
            .ok_or_else(|| {
                GraphError::violation(format!("wilderness block {coord} cannot have an owner"))
            })?;
        if let Some(resident_id) = resident_id {
            let resident = self.live_resident(resident_id)?;
            let resident = resident.read().expect("lock poisoned");
            if resident.town != Some(town_id) {
                return Err(GraphError::violation(format!(
                    "resident '{}' is not a member of the owning town",
                    resident.name
                )));
            }
        }
        {
            let mut block = handle.write().expect("lock poisoned");
            block.resident = resident_id;
            block.persist = PersistState::Dirty;
        }
        self.persist_town_block(&handle).await;
        Ok(())
    }

    pub async fn set_home_block(
        &self,
        town_id: TownId,
        block_id: TownBlockId,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let town = self.live_town(town_id)?;
        let block = self
            .universe
            .town_block(block_id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, block_id.to_string()))?;
        if block.read().expect("lock poisoned").town != Some(town_id) {
            return Err(GraphError::violation(
                "home block must be a block of the town".to_string(),
            ));
        }
        {
            let mut town = town.write().expect("lock poisoned");
            town.home_block = Some(block_id);
            town.persist = PersistState::Dirty;
        }
        self.persist_town(&town).await;
        Ok(())
    }

    /// Set the town spawn. Requires a home block; clearing the home block
    /// clears the spawn with it.
    pub async fn set_spawn(&self, town_id: TownId, spawn: Position) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let town = self.live_town(town_id)?;
        {
            let mut town = town.write().expect("lock poisoned");
            if town.home_block.is_none() {
                return Err(GraphError::violation(format!(
                    "town '{}' needs a home block before a spawn",
                    town.name
                )));
            }
            town.spawn = Some(spawn);
            town.persist = PersistState::Dirty;
        }
        self.persist_town(&town).await;
        Ok(())
    }

    // --- alliances ---

    /// Record an alliance. The relation is symmetric; both sides change in
    /// the same operation.
    pub async fn add_ally(&self, a: NationId, b: NationId) -> Result<(), GraphError> {
        if a == b {
            return Err(GraphError::violation(
                "a nation cannot ally itself".to_string(),
            ));
        }
        let _guard = self.structural.lock().await;
        let first = self.live_nation(a)?;
        let second = self.live_nation(b)?;
        {
            let mut first = first.write().expect("lock poisoned");
            if !first.is_allied_with(b) {
                first.allies.push(b);
                first.persist = PersistState::Dirty;
            }
        }
        {
            let mut second = second.write().expect("lock poisoned");
            if !second.is_allied_with(a) {
                second.allies.push(a);
                second.persist = PersistState::Dirty;
            }
        }
        self.persist_nation(&first).await;
        self.persist_nation(&second).await;
        Ok(())
    }

    pub async fn remove_ally(&self, a: NationId, b: NationId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let first = self.live_nation(a)?;
        let second = self.live_nation(b)?;
        {
            let mut first = first.write().expect("lock poisoned");
            first.allies.retain(|id| *id != b);
            first.persist = PersistState::Dirty;
        }
        {
            let mut second = second.write().expect("lock poisoned");
            second.allies.retain(|id| *id != a);
            second.persist = PersistState::Dirty;
        }
        self.persist_nation(&first).await;
        self.persist_nation(&second).await;
        Ok(())
    }

    // --- plot groups ---

    /// Create a plot group seeded with its first block. Groups are never
    /// empty: the last block leaving deletes the group.
    pub async fn create_plot_group(
        &self,
        town_id: TownId,
        name: &str,
        first_block: TownBlockId,
    ) -> Result<Handle<PlotGroup>, GraphError> {
        validate_name(EntityKind::PlotGroup, name)?;
        let _guard = self.structural.lock().await;
        self.live_town(town_id)?;
        let block = self
            .universe
            .town_block(first_block)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, first_block.to_string()))?;
        {
            let block = block.read().expect("lock poisoned");
            if block.town != Some(town_id) {
                return Err(GraphError::violation(
                    "plot group blocks must belong to the group's town".to_string(),
                ));
            }
            if block.plot_group.is_some() {
                return Err(GraphError::violation(format!(
                    "block {} already belongs to a plot group",
                    block.coord
                )));
            }
        }
        let mut group = PlotGroup::new(name, town_id);
        group.blocks.push(first_block);
        let group_id = group.id;
        let handle = self.universe.register_plot_group(group)?;
        {
            let mut block = block.write().expect("lock poisoned");
            block.plot_group = Some(group_id);
            block.persist = PersistState::Dirty;
        }
        info!(group = name, "Registered plot group");
        self.persist_plot_group(&handle).await;
        self.persist_town_block(&block).await;
        self.save_plot_group_index().await;
        Ok(handle)
    }

    pub async fn add_block_to_group(
        &self,
        group_id: PlotGroupId,
        block_id: TownBlockId,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let group = self.live_plot_group(group_id)?;
        let block = self
            .universe
            .town_block(block_id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, block_id.to_string()))?;
        let group_town = group.read().expect("lock poisoned").town;
        {
            let block = block.read().expect("lock poisoned");
            if block.town != Some(group_town) {
                return Err(GraphError::violation(
                    "plot group blocks must belong to the group's town".to_string(),
                ));
            }
            if block.plot_group.is_some() {
                return Err(GraphError::violation(format!(
                    "block {} already belongs to a plot group",
                    block.coord
                )));
            }
        }
        {
            let mut group = group.write().expect("lock poisoned");
            group.blocks.push(block_id);
            group.persist = PersistState::Dirty;
        }
        {
            let mut block = block.write().expect("lock poisoned");
            block.plot_group = Some(group_id);
            block.persist = PersistState::Dirty;
        }
        self.persist_plot_group(&group).await;
        self.persist_town_block(&block).await;
        Ok(())
    }

    /// Detach a block from its plot group, deleting the group if that was
    /// its last block.
    pub async fn remove_block_from_group(&self, block_id: TownBlockId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let block = self
            .universe
            .town_block(block_id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::TownBlock, block_id.to_string()))?;
        let group_id = {
            let mut block = block.write().expect("lock poisoned");
            let group_id = block.plot_group.ok_or_else(|| {
                GraphError::violation(format!(
                    "block {} does not belong to a plot group",
                    block.coord
                ))
            })?;
            block.plot_group = None;
            block.persist = PersistState::Dirty;
            group_id
        };
        self.persist_town_block(&block).await;
        self.drop_block_from_group_inner(group_id, block_id).await;
        Ok(())
    }

    /// Remove one block from a group's set, deleting the group when it
    /// empties. Best-effort: a missing group is already gone.
    async fn drop_block_from_group_inner(&self, group_id: PlotGroupId, block_id: TownBlockId) {
        let Some(group) = self.universe.plot_group_by_id(group_id) else {
            return;
        };
        let now_empty = {
            let mut group = group.write().expect("lock poisoned");
            group.blocks.retain(|id| *id != block_id);
            group.persist = PersistState::Dirty;
            group.is_empty()
        };
        if now_empty {
            if let Err(err) = self.delete_plot_group_inner(group_id).await {
                warn!("Could not delete emptied plot group: {err}");
            }
        } else {
            self.persist_plot_group(&group).await;
        }
    }

    pub async fn delete_plot_group(&self, id: PlotGroupId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.delete_plot_group_inner(id).await
    }

    async fn delete_plot_group_inner(&self, id: PlotGroupId) -> Result<(), GraphError> {
        let handle = self.live_plot_group(id)?;
        let (name, block_ids) = {
            let group = handle.read().expect("lock poisoned");
            (group.name.clone(), group.blocks.clone())
        };
        for block_id in block_ids {
            if let Some(block) = self.universe.town_block(block_id) {
                {
                    let mut block = block.write().expect("lock poisoned");
                    block.plot_group = None;
                    block.persist = PersistState::Dirty;
                }
                self.persist_town_block(&block).await;
            }
        }
        self.universe.unregister_plot_group(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_plot_group(id).await {
            warn!(group = %name, "Could not delete plot group: {err}");
        }
        info!(group = %name, "Deleted plot group");
        self.save_plot_group_index().await;
        Ok(())
    }

    // --- jails ---

    /// Create a jail whose cells are blocks of the owning town.
    pub async fn create_jail(
        &self,
        town_id: TownId,
        name: &str,
        cells: Vec<TownBlockId>,
    ) -> Result<Handle<Jail>, GraphError> {
        validate_name(EntityKind::Jail, name)?;
        let _guard = self.structural.lock().await;
        self.live_town(town_id)?;
        if cells.is_empty() {
            return Err(GraphError::violation(
                "a jail needs at least one cell".to_string(),
            ));
        }
        for cell in &cells {
            let owned = self
                .universe
                .town_block(*cell)
                .map(|b| b.read().expect("lock poisoned").town == Some(town_id))
                .unwrap_or(false);
            if !owned {
                return Err(GraphError::violation(
                    "jail cells must be blocks of the jail's town".to_string(),
                ));
            }
        }
        let handle = self.universe.register_jail(Jail::new(name, town_id, cells))?;
        info!(jail = name, "Registered jail");
        self.persist_jail(&handle).await;
        self.save_jail_index().await;
        Ok(handle)
    }

    /// Remove a released block from every jail that listed it as a cell,
    /// deleting any jail whose last cell goes. Jail records must never
    /// keep an id for a block that no longer exists.
    async fn drop_block_from_jails_inner(&self, block_id: TownBlockId) {
        for jail in self.universe.jails() {
            let touched = {
                let mut jail = jail.write().expect("lock poisoned");
                let before = jail.cells.len();
                jail.cells.retain(|id| *id != block_id);
                if jail.cells.len() == before {
                    None
                } else {
                    jail.persist = PersistState::Dirty;
                    Some((jail.id, jail.cells.is_empty()))
                }
            };
            match touched {
                Some((jail_id, true)) => {
                    if let Err(err) = self.delete_jail_inner(jail_id).await {
                        warn!("Could not delete emptied jail: {err}");
                    }
                }
                Some((_, false)) => self.persist_jail(&jail).await,
                None => {}
            }
        }
    }

    pub async fn delete_jail(&self, id: JailId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.delete_jail_inner(id).await
    }

    async fn delete_jail_inner(&self, id: JailId) -> Result<(), GraphError> {
        let handle = self.live_jail(id)?;
        let name = handle.read().expect("lock poisoned").name.clone();
        self.universe.unregister_jail(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_jail(id).await {
            warn!(jail = %name, "Could not delete jail: {err}");
        }
        info!(jail = %name, "Deleted jail");
        self.save_jail_index().await;
        Ok(())
    }

    // --- deletion cascades ---

    /// Delete a town. Residents are severed (their records survive), all
    /// blocks are released, plot groups and jails go with the town, and an
    /// emptied nation is deleted in turn.
    pub async fn delete_town(&self, id: TownId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.delete_town_inner(id).await
    }

    async fn delete_town_inner(&self, id: TownId) -> Result<(), GraphError> {
        let handle = self.live_town(id)?;
        let (name, residents, blocks, nation) = {
            let town = handle.read().expect("lock poisoned");
            (
                town.name.clone(),
                town.residents.clone(),
                town.town_blocks.clone(),
                town.nation,
            )
        };
        info!(town = %name, "Deleting town");

        for resident_id in residents {
            if let Some(resident) = self.universe.resident_by_id(resident_id) {
                {
                    let mut resident = resident.write().expect("lock poisoned");
                    resident.town = None;
                    resident.persist = PersistState::Dirty;
                }
                self.persist_resident(&resident).await;
            }
        }
        for block_id in blocks {
            if let Some(block) = self.universe.unregister_town_block(block_id) {
                block.write().expect("lock poisoned").persist = PersistState::Deleted;
                if let Err(err) = self.backend.delete_town_block(block_id).await {
                    warn!("Could not delete town block: {err}");
                }
            }
        }
        for group in self.universe.plot_groups() {
            let group_id = {
                let group = group.read().expect("lock poisoned");
                (group.town == id).then_some(group.id)
            };
            if let Some(group_id) = group_id {
                self.universe.unregister_plot_group(group_id);
                group.write().expect("lock poisoned").persist = PersistState::Deleted;
                if let Err(err) = self.backend.delete_plot_group(group_id).await {
                    warn!("Could not delete plot group: {err}");
                }
            }
        }
        for jail in self.universe.jails() {
            let jail_id = {
                let jail = jail.read().expect("lock poisoned");
                (jail.town == id).then_some(jail.id)
            };
            if let Some(jail_id) = jail_id {
                self.universe.unregister_jail(jail_id);
                jail.write().expect("lock poisoned").persist = PersistState::Deleted;
                if let Err(err) = self.backend.delete_jail(jail_id).await {
                    warn!("Could not delete jail: {err}");
                }
            }
        }
        if let Some(nation_id) = nation {
            self.detach_town_from_nation(nation_id, id).await?;
        }

        self.universe.unregister_town(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_town(id).await {
            warn!(town = %name, "Could not delete town: {err}");
        }
        self.save_town_index().await;
        self.save_town_block_index().await;
        self.save_plot_group_index().await;
        self.save_jail_index().await;
        Ok(())
    }

    /// Remove a town from its nation's roster. Deletes the nation when the
    /// roster empties; reassigns the capital (largest remaining town by
    /// roster size) when the capital leaves.
    pub(super) async fn detach_town_from_nation(
        &self,
        nation_id: NationId,
        town_id: TownId,
    ) -> Result<(), GraphError> {
        let Some(nation) = self.universe.nation_by_id(nation_id) else {
            return Ok(());
        };
        let (now_empty, capital_lost) = {
            let mut nation = nation.write().expect("lock poisoned");
            nation.towns.retain(|id| *id != town_id);
            nation.persist = PersistState::Dirty;
            (nation.towns.is_empty(), nation.capital == town_id)
        };
        if now_empty {
            info!("Nation lost its last town, deleting");
            return self.delete_nation_inner(nation_id).await;
        }
        if capital_lost {
            let remaining = nation.read().expect("lock poisoned").towns.clone();
            let new_capital = remaining
                .iter()
                .copied()
                .max_by_key(|id| {
                    self.universe
                        .town_by_id(*id)
                        .map(|t| t.read().expect("lock poisoned").residents.len())
                        .unwrap_or(0)
                });
            if let Some(new_capital) = new_capital {
                let mut nation = nation.write().expect("lock poisoned");
                nation.capital = new_capital;
                info!(nation = %nation.name, "Reassigned nation capital");
            }
        }
        self.persist_nation(&nation).await;
        Ok(())
    }

    /// Delete a nation. Member towns survive with their nation reference
    /// cleared; allies drop their side of the relation.
    pub async fn delete_nation(&self, id: NationId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.delete_nation_inner(id).await
    }

    async fn delete_nation_inner(&self, id: NationId) -> Result<(), GraphError> {
        let handle = self.live_nation(id)?;
        let (name, towns, allies) = {
            let nation = handle.read().expect("lock poisoned");
            (nation.name.clone(), nation.towns.clone(), nation.allies.clone())
        };
        info!(nation = %name, "Deleting nation");

        for town_id in towns {
            if let Some(town) = self.universe.town_by_id(town_id) {
                {
                    let mut town = town.write().expect("lock poisoned");
                    town.nation = None;
                    town.persist = PersistState::Dirty;
                }
                self.persist_town(&town).await;
            }
        }
        for ally_id in allies {
            if let Some(ally) = self.universe.nation_by_id(ally_id) {
                {
                    let mut ally = ally.write().expect("lock poisoned");
                    ally.allies.retain(|other| *other != id);
                    ally.persist = PersistState::Dirty;
                }
                self.persist_nation(&ally).await;
            }
        }

        self.universe.unregister_nation(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_nation(id).await {
            warn!(nation = %name, "Could not delete nation: {err}");
        }
        self.save_nation_index().await;
        Ok(())
    }

    /// Delete a resident. Their town roster entry, personal block
    /// ownership, and any hibernated copy are all removed; an emptied town
    /// is deleted.
    pub async fn delete_resident(&self, id: ResidentId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.delete_resident_inner(id).await
    }

    async fn delete_resident_inner(&self, id: ResidentId) -> Result<(), GraphError> {
        let handle = self.live_resident(id)?;
        let (name, town, player) = {
            let resident = handle.read().expect("lock poisoned");
            (resident.name.clone(), resident.town, resident.player)
        };
        info!(resident = %name, "Deleting resident");

        if town.is_some() {
            self.remove_resident_from_town_inner(id).await?;
        }
        if let Some(player) = player {
            if self.universe.is_hibernated(player) {
                self.universe.remove_hibernated(player);
                if let Err(err) = self.backend.delete_hibernated_resident(player).await {
                    warn!(resident = %name, "Could not delete hibernated record: {err}");
                }
            }
        }

        self.universe.unregister_resident(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_resident(id).await {
            warn!(resident = %name, "Could not delete resident: {err}");
        }
        self.save_resident_index().await;
        Ok(())
    }

    /// Delete a world. Refused while any block in it is still claimed;
    /// leftover wilderness blocks are swept out with it.
    pub async fn delete_world(&self, id: WorldId) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        let handle = self.live_world(id)?;
        let name = handle.read().expect("lock poisoned").name.clone();

        let mut wilderness = Vec::new();
        for block in self.universe.town_blocks() {
            let block = block.read().expect("lock poisoned");
            if block.coord.world != id {
                continue;
            }
            if block.has_town() {
                return Err(GraphError::violation(format!(
                    "world '{name}' still has claimed blocks"
                )));
            }
            wilderness.push(block.id);
        }
        for block_id in wilderness {
            if let Some(block) = self.universe.unregister_town_block(block_id) {
                block.write().expect("lock poisoned").persist = PersistState::Deleted;
                if let Err(err) = self.backend.delete_town_block(block_id).await {
                    warn!("Could not delete town block: {err}");
                }
            }
        }

        self.universe.unregister_world(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_world(id).await {
            warn!(world = %name, "Could not delete world: {err}");
        }
        info!(world = %name, "Deleted world");
        self.save_world_index().await;
        self.save_town_block_index().await;
        Ok(())
    }

    // --- hibernation ---

    /// Move a townless, player-backed resident out of the active registry
    /// into cold storage. The cold write must succeed before the active
    /// record is touched.
    pub async fn hibernate_resident(&self, id: ResidentId) -> Result<(), OpError> {
        let _guard = self.structural.lock().await;
        let handle = self.live_resident(id)?;
        let (name, player, record) = {
            let resident = handle.read().expect("lock poisoned");
            let player = resident.player.ok_or_else(|| {
                GraphError::violation(format!(
                    "resident '{}' has no platform account",
                    resident.name
                ))
            })?;
            if resident.has_town() {
                return Err(GraphError::violation(format!(
                    "resident '{}' still belongs to a town",
                    resident.name
                ))
                .into());
            }
            (resident.name.clone(), player, resident.clone())
        };

        self.backend.save_hibernated_resident(&record).await?;

        self.universe.unregister_resident(id);
        handle.write().expect("lock poisoned").persist = PersistState::Deleted;
        self.universe.add_hibernated(player);
        if let Err(err) = self.backend.delete_resident(id).await {
            warn!(resident = %name, "Could not delete active record: {err}");
        }
        info!(resident = %name, "Hibernated resident");
        self.save_resident_index().await;
        Ok(())
    }

    /// Restore a hibernated resident into the active registry.
    pub async fn wake_resident(&self, player: Uuid) -> Result<Handle<Resident>, OpError> {
        let _guard = self.structural.lock().await;
        if self.universe.resident_by_player(player).is_some() {
            return Err(GraphError::violation(format!(
                "platform account {player} already has an active resident"
            ))
            .into());
        }
        let mut record = self.backend.load_hibernated_resident(player).await?;
        record.persist = PersistState::Transient;
        record.last_online = Utc::now();
        let name = record.name.clone();
        let handle = self
            .universe
            .register_resident(record)
            .map_err(OpError::Graph)?;

        self.universe.remove_hibernated(player);
        if let Err(err) = self.backend.delete_hibernated_resident(player).await {
            warn!(resident = %name, "Could not delete hibernated record: {err}");
        }
        info!(resident = %name, "Woke hibernated resident");
        self.persist_resident(&handle).await;
        self.save_resident_index().await;
        Ok(handle)
    }

    /// Hibernate every townless player resident absent past `retention`.
    /// Returns how many were moved to cold storage.
    pub async fn hibernate_absent_residents(&self, retention: chrono::Duration) -> usize {
        let now = Utc::now();
        let candidates: Vec<ResidentId> = self
            .universe
            .residents()
            .iter()
            .filter_map(|handle| {
                let resident = handle.read().expect("lock poisoned");
                (resident.player.is_some()
                    && !resident.npc
                    && !resident.has_town()
                    && resident.absent_past(retention, now))
                .then_some(resident.id)
            })
            .collect();

        let mut moved = 0;
        for id in candidates {
            match self.hibernate_resident(id).await {
                Ok(()) => moved += 1,
                Err(err) => warn!("Could not hibernate resident: {err}"),
            }
        }
        if moved > 0 {
            info!(count = moved, "Hibernated absent residents");
        }
        moved
    }

    // --- renames ---

    pub async fn rename_town(&self, id: TownId, new_name: &str) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.universe.rename_town(id, new_name)?;
        info!(town = new_name, "Renamed town");
        if let Some(town) = self.universe.town_by_id(id) {
            self.persist_town(&town).await;
        }
        self.save_town_index().await;
        Ok(())
    }

    pub async fn rename_nation(&self, id: NationId, new_name: &str) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.universe.rename_nation(id, new_name)?;
        info!(nation = new_name, "Renamed nation");
        if let Some(nation) = self.universe.nation_by_id(id) {
            self.persist_nation(&nation).await;
        }
        self.save_nation_index().await;
        Ok(())
    }

    pub async fn rename_resident(&self, id: ResidentId, new_name: &str) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.universe.rename_resident(id, new_name)?;
        info!(resident = new_name, "Renamed resident");
        if let Some(resident) = self.universe.resident_by_id(id) {
            self.persist_resident(&resident).await;
        }
        self.save_resident_index().await;
        Ok(())
    }

    pub async fn rename_plot_group(
        &self,
        id: PlotGroupId,
        new_name: &str,
    ) -> Result<(), GraphError> {
        let _guard = self.structural.lock().await;
        self.universe.rename_plot_group(id, new_name)?;
        info!(group = new_name, "Renamed plot group");
        if let Some(group) = self.universe.plot_group_by_id(id) {
            self.persist_plot_group(&group).await;
        }
        self.save_plot_group_index().await;
        Ok(())
    }

    // --- live-entity lookups ---
    //
    // A handle can outlive its registration (a caller may hold one across a
    // delete); these reject both missing and already-deleted entities.

    pub(super) fn live_world(&self, id: WorldId) -> Result<Handle<World>, GraphError> {
        let handle = self
            .universe
            .world_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::World, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::World, id)?;
        Ok(handle)
    }

    pub(super) fn live_town(&self, id: TownId) -> Result<Handle<Town>, GraphError> {
        let handle = self
            .universe
            .town_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Town, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::Town, id)?;
        Ok(handle)
    }

    pub(super) fn live_nation(&self, id: NationId) -> Result<Handle<Nation>, GraphError> {
        let handle = self
            .universe
            .nation_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Nation, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::Nation, id)?;
        Ok(handle)
    }

    pub(super) fn live_resident(&self, id: ResidentId) -> Result<Handle<Resident>, GraphError> {
        let handle = self
            .universe
            .resident_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Resident, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::Resident, id)?;
        Ok(handle)
    }

    pub(super) fn live_plot_group(&self, id: PlotGroupId) -> Result<Handle<PlotGroup>, GraphError> {
        let handle = self
            .universe
            .plot_group_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::PlotGroup, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::PlotGroup, id)?;
        Ok(handle)
    }

    pub(super) fn live_jail(&self, id: JailId) -> Result<Handle<Jail>, GraphError> {
        let handle = self
            .universe
            .jail_by_id(id)
            .ok_or_else(|| GraphError::not_registered(EntityKind::Jail, id.to_string()))?;
        ensure_live(handle.read().expect("lock poisoned").persist, EntityKind::Jail, id)?;
        Ok(handle)
    }
}

fn ensure_live(
    persist: PersistState,
    kind: EntityKind,
    id: impl std::fmt::Display,
) -> Result<(), GraphError> {
    if persist.is_deleted() {
        return Err(GraphError::violation(format!(
            "{kind} {id} has been deleted"
        )));
    }
    Ok(())
}
