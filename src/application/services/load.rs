//! Load orchestrator - dependency-respecting startup load
//!
//! The sequence is fixed: all list indices first (so every later phase can
//! resolve cross-references against registered shells), then full records
//! in dependency order - worlds, residents, towns, nations, town blocks,
//! plot groups, jails - and finally the best-effort auxiliary records
//! (work queues, hibernated residents). Reversing towns and town blocks
//! would leave blocks unable to find their owning town.
//!
//! The first failing phase aborts the load; the kinds whose record phase
//! did not complete are rolled back so callers never observe a partially
//! resolved kind.

use tracing::{debug, error, info, warn};

use crate::application::ports::outbound::StorageError;
use crate::application::services::DataStore;
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::error::{EntityKind, GraphError};
use crate::domain::value_objects::PersistState;

/// The phases of `load_all`, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPhase {
    Indexes,
    Worlds,
    Residents,
    Towns,
    Nations,
    TownBlocks,
    PlotGroups,
    Jails,
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadPhase::Indexes => "index",
            LoadPhase::Worlds => "world",
            LoadPhase::Residents => "resident",
            LoadPhase::Towns => "town",
            LoadPhase::Nations => "nation",
            LoadPhase::TownBlocks => "town block",
            LoadPhase::PlotGroups => "plot group",
            LoadPhase::Jails => "jail",
        };
        f.write_str(s)
    }
}

/// Why a phase failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The store decoded cleanly but its records contradict each other.
    #[error("inconsistent records: {0}")]
    Inconsistent(String),
}

/// A fatal startup error: the failing phase plus its cause.
#[derive(Debug, thiserror::Error)]
#[error("load aborted in {phase} phase: {source}")]
pub struct LoadError {
    pub phase: LoadPhase,
    #[source]
    pub source: LoadFailure,
}

/// Record phases paired with the kind they resolve, in execution order.
const RECORD_PHASES: &[(LoadPhase, EntityKind)] = &[
    (LoadPhase::Worlds, EntityKind::World),
    (LoadPhase::Residents, EntityKind::Resident),
    (LoadPhase::Towns, EntityKind::Town),
    (LoadPhase::Nations, EntityKind::Nation),
    (LoadPhase::TownBlocks, EntityKind::TownBlock),
    (LoadPhase::PlotGroups, EntityKind::PlotGroup),
    (LoadPhase::Jails, EntityKind::Jail),
];

fn inconsistent(msg: String) -> LoadFailure {
    LoadFailure::Inconsistent(msg)
}

impl DataStore {
    /// Load the entire graph from the backing store. Runs once at startup,
    /// before the surrounding service accepts external calls; any failure
    /// is fatal and must abort startup.
    pub async fn load_all(&self) -> Result<(), LoadError> {
        let _guard = self.structural.lock().await;
        info!("Loading world graph from backing store");

        let result = self.run_load_phases().await;
        match &result {
            Ok(()) => {
                let counts = self.universe.counts();
                info!(
                    worlds = counts.worlds,
                    towns = counts.towns,
                    nations = counts.nations,
                    residents = counts.residents,
                    town_blocks = counts.town_blocks,
                    "World graph loaded"
                );
            }
            Err(err) => {
                error!(phase = %err.phase, "Load aborted: {}", err.source);
                self.rollback_from(err.phase);
            }
        }
        result
    }

    async fn run_load_phases(&self) -> Result<(), LoadError> {
        let phase = |phase: LoadPhase| move |source: LoadFailure| LoadError { phase, source };

        self.load_indexes().await.map_err(phase(LoadPhase::Indexes))?;
        self.load_worlds().await.map_err(phase(LoadPhase::Worlds))?;
        self.load_residents()
            .await
            .map_err(phase(LoadPhase::Residents))?;
        self.load_towns().await.map_err(phase(LoadPhase::Towns))?;
        self.load_nations().await.map_err(phase(LoadPhase::Nations))?;
        self.load_town_blocks()
            .await
            .map_err(phase(LoadPhase::TownBlocks))?;
        self.load_plot_groups()
            .await
            .map_err(phase(LoadPhase::PlotGroups))?;
        self.load_jails().await.map_err(phase(LoadPhase::Jails))?;
        self.load_auxiliary().await;
        Ok(())
    }

    /// Drop the kinds whose record phase did not complete, so a failed load
    /// never exposes a partially resolved kind.
    fn rollback_from(&self, failed: LoadPhase) {
        let start = RECORD_PHASES
            .iter()
            .position(|(phase, _)| *phase == failed)
            .unwrap_or(0);
        for (_, kind) in &RECORD_PHASES[start..] {
            self.universe.clear_kind(*kind);
        }
    }

    /// Phase 1: register an empty shell for every indexed entity.
    async fn load_indexes(&self) -> Result<(), LoadFailure> {
        debug!("Loading list indices");
        for stub in self.backend.world_list().await? {
            self.universe
                .register_world(World::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.nation_list().await? {
            self.universe
                .register_nation(Nation::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.town_list().await? {
            self.universe
                .register_town(Town::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.plot_group_list().await? {
            self.universe
                .register_plot_group(PlotGroup::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.jail_list().await? {
            self.universe
                .register_jail(Jail::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.resident_list().await? {
            self.universe
                .register_resident(Resident::shell(stub.id.into(), stub.name))?;
        }
        for stub in self.backend.town_block_list().await? {
            self.universe
                .register_town_block(TownBlock::shell(stub.id, stub.coord))?;
        }
        Ok(())
    }

    /// Phase 2: full world records.
    async fn load_worlds(&self) -> Result<(), LoadFailure> {
        debug!("Loading worlds");
        for handle in self.universe.worlds() {
            let (id, name) = {
                let world = handle.read().expect("lock poisoned");
                (world.id, world.name.clone())
            };
            let mut record = self.backend.load_world(id).await.map_err(|err| {
                error!("Could not read world data '{name}'");
                err
            })?;
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }
        Ok(())
    }

    /// Phase 3: full resident records. Town references resolve against the
    /// shells registered in phase 1.
    async fn load_residents(&self) -> Result<(), LoadFailure> {
        debug!("Loading residents");
        for handle in self.universe.residents() {
            let (id, name) = {
                let resident = handle.read().expect("lock poisoned");
                (resident.id, resident.name.clone())
            };
            let mut record = self.backend.load_resident(id).await.map_err(|err| {
                error!("Could not read resident data '{name}'");
                err
            })?;
            if let Some(town) = record.town {
                if self.universe.town_by_id(town).is_none() {
                    return Err(inconsistent(format!(
                        "resident '{name}' references unknown town {town}"
                    )));
                }
            }
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            let player = record.player;
            *handle.write().expect("lock poisoned") = record;
            if let Some(player) = player {
                self.universe.index_player(player, id);
            }
        }
        Ok(())
    }

    /// Phase 4: full town records. Rosters must agree with the resident
    /// records loaded in phase 3; home block and spawn stay unresolved
    /// until town blocks exist.
    async fn load_towns(&self) -> Result<(), LoadFailure> {
        debug!("Loading towns");
        for handle in self.universe.towns() {
            let (id, name) = {
                let town = handle.read().expect("lock poisoned");
                (town.id, town.name.clone())
            };
            let mut record = self.backend.load_town(id).await.map_err(|err| {
                error!("Could not read town data '{name}'");
                err
            })?;
            for member in &record.residents {
                let resident = self.universe.resident_by_id(*member).ok_or_else(|| {
                    inconsistent(format!("town '{name}' lists unknown resident {member}"))
                })?;
                if resident.read().expect("lock poisoned").town != Some(id) {
                    return Err(inconsistent(format!(
                        "town '{name}' lists resident {member} who does not belong to it"
                    )));
                }
            }
            if let Some(nation) = record.nation {
                if self.universe.nation_by_id(nation).is_none() {
                    return Err(inconsistent(format!(
                        "town '{name}' references unknown nation {nation}"
                    )));
                }
            }
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }

        // A resident claiming membership in a town that does not list it is
        // just as dangling as the reverse.
        for handle in self.universe.residents() {
            let resident = handle.read().expect("lock poisoned");
            if let Some(town_id) = resident.town {
                let town = self
                    .universe
                    .town_by_id(town_id)
                    .ok_or_else(|| inconsistent(format!("unknown town {town_id}")))?;
                if !town.read().expect("lock poisoned").has_resident(resident.id) {
                    return Err(inconsistent(format!(
                        "resident '{}' claims town {town_id} which does not list them",
                        resident.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Phase 5: full nation records, including capital and symmetric ally
    /// verification.
    async fn load_nations(&self) -> Result<(), LoadFailure> {
        debug!("Loading nations");
        for handle in self.universe.nations() {
            let (id, name) = {
                let nation = handle.read().expect("lock poisoned");
                (nation.id, nation.name.clone())
            };
            let mut record = self.backend.load_nation(id).await.map_err(|err| {
                error!("Could not read nation data '{name}'");
                err
            })?;
            if record.towns.is_empty() {
                return Err(inconsistent(format!("nation '{name}' has no towns")));
            }
            for town_id in &record.towns {
                let town = self.universe.town_by_id(*town_id).ok_or_else(|| {
                    inconsistent(format!("nation '{name}' lists unknown town {town_id}"))
                })?;
                if town.read().expect("lock poisoned").nation != Some(id) {
                    return Err(inconsistent(format!(
                        "nation '{name}' lists town {town_id} which does not belong to it"
                    )));
                }
            }
            if !record.towns.contains(&record.capital) {
                return Err(inconsistent(format!(
                    "nation '{name}' capital {} is not one of its towns",
                    record.capital
                )));
            }
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }

        // Alliance is symmetric; verify both directions once all records
        // are in place.
        for handle in self.universe.nations() {
            let nation = handle.read().expect("lock poisoned");
            for ally_id in &nation.allies {
                let ally = self
                    .universe
                    .nation_by_id(*ally_id)
                    .ok_or_else(|| inconsistent(format!("unknown ally nation {ally_id}")))?;
                if !ally.read().expect("lock poisoned").is_allied_with(nation.id) {
                    return Err(inconsistent(format!(
                        "nation '{}' ally {ally_id} does not reciprocate",
                        nation.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Phase 6: full town block records. Must follow towns and nations so
    /// an owning town already exists to attach to; settles the home blocks
    /// deferred in phase 4.
    async fn load_town_blocks(&self) -> Result<(), LoadFailure> {
        debug!("Loading town blocks");
        for handle in self.universe.town_blocks() {
            let (id, coord) = {
                let block = handle.read().expect("lock poisoned");
                (block.id, block.coord)
            };
            let mut record = self.backend.load_town_block(id).await.map_err(|err| {
                error!("Could not read town block data '{coord}'");
                err
            })?;
            if self.universe.world_by_id(coord.world).is_none() {
                return Err(inconsistent(format!(
                    "town block {coord} lies in unknown world {}",
                    coord.world
                )));
            }
            if let Some(town_id) = record.town {
                let town = self.universe.town_by_id(town_id).ok_or_else(|| {
                    inconsistent(format!("town block {coord} references unknown town {town_id}"))
                })?;
                if !town.read().expect("lock poisoned").has_town_block(id) {
                    return Err(inconsistent(format!(
                        "town block {coord} claims town {town_id} which does not list it"
                    )));
                }
                if let Some(resident_id) = record.resident {
                    let member = self
                        .universe
                        .resident_by_id(resident_id)
                        .map(|r| r.read().expect("lock poisoned").town == Some(town_id))
                        .unwrap_or(false);
                    if !member {
                        return Err(inconsistent(format!(
                            "town block {coord} owner {resident_id} is not a member of town {town_id}"
                        )));
                    }
                }
            } else if record.resident.is_some() {
                return Err(inconsistent(format!(
                    "wilderness block {coord} has a resident owner"
                )));
            }
            if let Some(group_id) = record.plot_group {
                if self.universe.plot_group_by_id(group_id).is_none() {
                    return Err(inconsistent(format!(
                        "town block {coord} references unknown plot group {group_id}"
                    )));
                }
            }
            record.id = id;
            record.coord = coord;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }

        // Block lists, home blocks and spawns deferred from the town phase
        // settle now. Dangling block entries are pruned, not fatal; blocks
        // are the forgiving side of the claim relation.
        for handle in self.universe.towns() {
            let mut town = handle.write().expect("lock poisoned");
            let town_id = town.id;
            let before = town.town_blocks.len();
            town.town_blocks.retain(|block_id| {
                self.universe
                    .town_block(*block_id)
                    .map(|b| b.read().expect("lock poisoned").town == Some(town_id))
                    .unwrap_or(false)
            });
            if town.town_blocks.len() != before {
                warn!(
                    town = %town.name,
                    dropped = before - town.town_blocks.len(),
                    "Pruned dangling town block references"
                );
                town.persist = PersistState::Dirty;
            }
            if let Some(home) = town.home_block {
                let valid = self
                    .universe
                    .town_block(home)
                    .map(|b| b.read().expect("lock poisoned").town == Some(town.id))
                    .unwrap_or(false);
                if !valid {
                    warn!(
                        town = %town.name,
                        "Dropping home block that no longer belongs to the town"
                    );
                    town.home_block = None;
                    town.spawn = None;
                    town.persist = PersistState::Dirty;
                }
            }
        }
        Ok(())
    }

    /// Phase 7a: plot groups. Groups that come back empty are dropped
    /// rather than registered.
    async fn load_plot_groups(&self) -> Result<(), LoadFailure> {
        debug!("Loading plot groups");
        for handle in self.universe.plot_groups() {
            let (id, name) = {
                let group = handle.read().expect("lock poisoned");
                (group.id, group.name.clone())
            };
            let mut record = self.backend.load_plot_group(id).await.map_err(|err| {
                error!("Could not read plot group data '{name}'");
                err
            })?;
            if record.blocks.is_empty() {
                debug!(group = %name, "Discarding empty plot group");
                self.universe.unregister_plot_group(id);
                if let Err(err) = self.backend.delete_plot_group(id).await {
                    warn!(group = %name, "Could not delete empty plot group: {err}");
                }
                continue;
            }
            if self.universe.town_by_id(record.town).is_none() {
                return Err(inconsistent(format!(
                    "plot group '{name}' references unknown town {}",
                    record.town
                )));
            }
            for block_id in &record.blocks {
                let linked = self
                    .universe
                    .town_block(*block_id)
                    .map(|b| b.read().expect("lock poisoned").plot_group == Some(id))
                    .unwrap_or(false);
                if !linked {
                    return Err(inconsistent(format!(
                        "plot group '{name}' lists block {block_id} which is not linked to it"
                    )));
                }
            }
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }
        Ok(())
    }

    /// Phase 7b: jails.
    async fn load_jails(&self) -> Result<(), LoadFailure> {
        debug!("Loading jails");
        for handle in self.universe.jails() {
            let (id, name) = {
                let jail = handle.read().expect("lock poisoned");
                (jail.id, jail.name.clone())
            };
            let mut record = self.backend.load_jail(id).await.map_err(|err| {
                error!("Could not read jail data '{name}'");
                err
            })?;
            if self.universe.town_by_id(record.town).is_none() {
                return Err(inconsistent(format!(
                    "jail '{name}' references unknown town {}",
                    record.town
                )));
            }
            for cell in &record.cells {
                let owned = self
                    .universe
                    .town_block(*cell)
                    .map(|b| b.read().expect("lock poisoned").town == Some(record.town))
                    .unwrap_or(false);
                if !owned {
                    return Err(inconsistent(format!(
                        "jail '{name}' cell {cell} is not a block of its town"
                    )));
                }
            }
            record.id = id;
            record.name = name;
            record.persist = PersistState::Clean;
            *handle.write().expect("lock poisoned") = record;
        }
        Ok(())
    }

    /// Phase 8: queued work and hibernated residents. Best-effort; never
    /// gates overall success.
    async fn load_auxiliary(&self) {
        match self.backend.load_regen_queue().await {
            Ok(queue) => self.universe.set_regen_queue(queue),
            Err(StorageError::Missing) => {}
            Err(err) => warn!("Could not load regen queue: {err}"),
        }
        match self.backend.load_snapshot_queue().await {
            Ok(queue) => self.universe.set_snapshot_queue(queue),
            Err(StorageError::Missing) => {}
            Err(err) => warn!("Could not load snapshot queue: {err}"),
        }
        match self.backend.hibernated_resident_list().await {
            Ok(players) => {
                for player in players {
                    self.universe.add_hibernated(player);
                }
            }
            Err(err) => warn!("Could not load hibernated residents: {err}"),
        }
    }
}
