//! Merge operations - absorb one town or nation into another
//!
//! A merge is validated in full before the first write. Every entity the
//! source hands over must be registered and must reference the source back;
//! any discrepancy rejects the whole merge with the graph untouched. Only
//! after validation passes does the apply stage move members, blocks and
//! back-references over and delete the source.

use tracing::{info, warn};

use crate::application::services::DataStore;
use crate::domain::error::GraphError;
use crate::domain::value_objects::{NationId, PersistState, TownId};

impl DataStore {
    /// Absorb `source` into `target`: residents, blocks, plot groups and
    /// jails all move over, then the source town is deleted.
    pub async fn merge_towns(&self, source: TownId, target: TownId) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::violation(
                "a town cannot merge into itself".to_string(),
            ));
        }
        let _guard = self.structural.lock().await;
        let source_town = self.live_town(source)?;
        let target_town = self.live_town(target)?;

        let (source_name, residents, blocks, nation) = {
            let town = source_town.read().expect("lock poisoned");
            (
                town.name.clone(),
                town.residents.clone(),
                town.town_blocks.clone(),
                town.nation,
            )
        };

        // Validation stage: nothing below may fail once we start writing.
        for resident_id in &residents {
            let linked = self
                .universe
                .resident_by_id(*resident_id)
                .map(|r| r.read().expect("lock poisoned").town == Some(source))
                .unwrap_or(false);
            if !linked {
                return Err(GraphError::violation(format!(
                    "town '{source_name}' roster entry {resident_id} is not a consistent member"
                )));
            }
        }
        for block_id in &blocks {
            let linked = self
                .universe
                .town_block(*block_id)
                .map(|b| b.read().expect("lock poisoned").town == Some(source))
                .unwrap_or(false);
            if !linked {
                return Err(GraphError::violation(format!(
                    "town '{source_name}' block {block_id} is not consistently claimed"
                )));
            }
        }

        info!(source = %source_name, "Merging town");

        for resident_id in &residents {
            if let Some(resident) = self.universe.resident_by_id(*resident_id) {
                {
                    let mut resident = resident.write().expect("lock poisoned");
                    resident.town = Some(target);
                    resident.persist = PersistState::Dirty;
                }
                self.persist_resident(&resident).await;
            }
        }
        for block_id in &blocks {
            if let Some(block) = self.universe.town_block(*block_id) {
                {
                    let mut block = block.write().expect("lock poisoned");
                    block.town = Some(target);
                    block.persist = PersistState::Dirty;
                }
                self.persist_town_block(&block).await;
            }
        }
        for group in self.universe.plot_groups() {
            let moved = {
                let mut group = group.write().expect("lock poisoned");
                if group.town == source {
                    group.town = target;
                    group.persist = PersistState::Dirty;
                    true
                } else {
                    false
                }
            };
            if moved {
                self.persist_plot_group(&group).await;
            }
        }
        for jail in self.universe.jails() {
            let moved = {
                let mut jail = jail.write().expect("lock poisoned");
                if jail.town == source {
                    jail.town = target;
                    jail.persist = PersistState::Dirty;
                    true
                } else {
                    false
                }
            };
            if moved {
                self.persist_jail(&jail).await;
            }
        }
        {
            let mut town = target_town.write().expect("lock poisoned");
            town.residents.extend(residents);
            town.town_blocks.extend(blocks);
            town.persist = PersistState::Dirty;
        }
        if let Some(nation_id) = nation {
            self.detach_town_from_nation(nation_id, source).await?;
        }

        self.universe.unregister_town(source);
        source_town.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_town(source).await {
            warn!(town = %source_name, "Could not delete merged town: {err}");
        }
        self.persist_town(&target_town).await;
        self.save_town_index().await;
        Ok(())
    }

    /// Absorb `source` into `target`: member towns switch nations, the
    /// target keeps its capital, the source's alliances dissolve, then the
    /// source nation is deleted.
    pub async fn merge_nations(&self, source: NationId, target: NationId) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::violation(
                "a nation cannot merge into itself".to_string(),
            ));
        }
        let _guard = self.structural.lock().await;
        let source_nation = self.live_nation(source)?;
        let target_nation = self.live_nation(target)?;

        let (source_name, towns, allies) = {
            let nation = source_nation.read().expect("lock poisoned");
            (
                nation.name.clone(),
                nation.towns.clone(),
                nation.allies.clone(),
            )
        };

        // Validation stage.
        for town_id in &towns {
            let linked = self
                .universe
                .town_by_id(*town_id)
                .map(|t| t.read().expect("lock poisoned").nation == Some(source))
                .unwrap_or(false);
            if !linked {
                return Err(GraphError::violation(format!(
                    "nation '{source_name}' town {town_id} is not a consistent member"
                )));
            }
        }

        info!(source = %source_name, "Merging nation");

        for town_id in &towns {
            if let Some(town) = self.universe.town_by_id(*town_id) {
                {
                    let mut town = town.write().expect("lock poisoned");
                    town.nation = Some(target);
                    town.persist = PersistState::Dirty;
                }
                self.persist_town(&town).await;
            }
        }
        for ally_id in allies {
            if let Some(ally) = self.universe.nation_by_id(ally_id) {
                {
                    let mut ally = ally.write().expect("lock poisoned");
                    ally.allies.retain(|id| *id != source);
                    ally.persist = PersistState::Dirty;
                }
                self.persist_nation(&ally).await;
            }
        }
        {
            let mut nation = target_nation.write().expect("lock poisoned");
            nation.towns.extend(towns);
            nation.allies.retain(|id| *id != source);
            nation.persist = PersistState::Dirty;
        }

        self.universe.unregister_nation(source);
        source_nation.write().expect("lock poisoned").persist = PersistState::Deleted;
        if let Err(err) = self.backend.delete_nation(source).await {
            warn!(nation = %source_name, "Could not delete merged nation: {err}");
        }
        self.persist_nation(&target_nation).await;
        self.save_nation_index().await;
        Ok(())
    }

}
