//! Query service - read-only derived lookups over the graph
//!
//! Everything here is computed from current registry state plus the
//! presence port; nothing is cached and nothing is written.

use std::sync::Arc;

use crate::application::ports::outbound::PresencePort;
use crate::application::universe::{Handle, Universe};
use crate::domain::entities::{Nation, Resident, Town, TownBlock};
use crate::domain::value_objects::{BlockCoord, NationId, Position, ResidentId, TownId};

/// Classification of a single coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TownBlockStatus {
    /// The world is unknown or has claims disabled.
    NotClaimable,
    /// Claimable, but nothing there.
    Wilderness,
    /// Unclaimed but within a nation's zone around its capital home block.
    NationZone(NationId),
    /// Claimed by a town, no personal owner.
    TownOwned(TownId),
    /// Claimed by a town and owned by one of its residents.
    PersonallyOwned { town: TownId, resident: ResidentId },
}

pub struct QueryService {
    universe: Arc<Universe>,
    presence: Arc<dyn PresencePort>,
    nation_zone_radius: u32,
}

impl QueryService {
    pub fn new(
        universe: Arc<Universe>,
        presence: Arc<dyn PresencePort>,
        nation_zone_radius: u32,
    ) -> Self {
        Self {
            universe,
            presence,
            nation_zone_radius,
        }
    }

    pub fn town_block_at(&self, coord: BlockCoord) -> Option<Handle<TownBlock>> {
        self.universe.town_block_at(coord)
    }

    /// The town owning the block at `coord`, if any.
    pub fn town_at(&self, coord: BlockCoord) -> Option<Handle<Town>> {
        let block = self.universe.town_block_at(coord)?;
        let town_id = block.read().expect("lock poisoned").town?;
        self.universe.town_by_id(town_id)
    }

    /// The nation whose member town owns the block at `coord`, if any.
    pub fn nation_at(&self, coord: BlockCoord) -> Option<Handle<Nation>> {
        let town = self.town_at(coord)?;
        let nation_id = town.read().expect("lock poisoned").nation?;
        self.universe.nation_by_id(nation_id)
    }

    /// The resident personally owning the block at `coord`, if any.
    pub fn resident_owner_at(&self, coord: BlockCoord) -> Option<Handle<Resident>> {
        let block = self.universe.town_block_at(coord)?;
        let resident_id = block.read().expect("lock poisoned").resident?;
        self.universe.resident_by_id(resident_id)
    }

    /// Classify a coordinate. Claims-disabled worlds short-circuit to
    /// [`TownBlockStatus::NotClaimable`] before anything else is looked at.
    pub fn classify(&self, coord: BlockCoord) -> TownBlockStatus {
        let claimable = self
            .universe
            .world_by_id(coord.world)
            .map(|w| w.read().expect("lock poisoned").claims_enabled)
            .unwrap_or(false);
        if !claimable {
            return TownBlockStatus::NotClaimable;
        }

        if let Some(block) = self.universe.town_block_at(coord) {
            let block = block.read().expect("lock poisoned");
            if let Some(town) = block.town {
                return match block.resident {
                    Some(resident) => TownBlockStatus::PersonallyOwned { town, resident },
                    None => TownBlockStatus::TownOwned(town),
                };
            }
        }

        if let Some(nation) = self.nation_zone_at(coord) {
            return TownBlockStatus::NationZone(nation);
        }
        TownBlockStatus::Wilderness
    }

    /// The nation whose zone covers an unclaimed `coord`, if any. The zone
    /// is a Chebyshev radius around each capital's home block; a radius of
    /// zero disables zones entirely, and capitals of opted-out towns are
    /// skipped.
    fn nation_zone_at(&self, coord: BlockCoord) -> Option<NationId> {
        if self.nation_zone_radius == 0 {
            return None;
        }
        for nation in self.universe.nations() {
            let (nation_id, capital_id) = {
                let nation = nation.read().expect("lock poisoned");
                (nation.id, nation.capital)
            };
            let Some(capital) = self.universe.town_by_id(capital_id) else {
                continue;
            };
            let home = {
                let capital = capital.read().expect("lock poisoned");
                if capital.nation_zone_opt_out {
                    continue;
                }
                capital.home_block
            };
            let Some(home) = home.and_then(|id| self.universe.town_block(id)) else {
                continue;
            };
            let home_coord = home.read().expect("lock poisoned").coord;
            match home_coord.distance(&coord) {
                Some(d) if d <= self.nation_zone_radius => return Some(nation_id),
                _ => {}
            }
        }
        None
    }

    /// Members of a town whose platform account is currently online.
    pub fn online_residents_of_town(&self, town_id: TownId) -> Vec<Handle<Resident>> {
        let Some(town) = self.universe.town_by_id(town_id) else {
            return Vec::new();
        };
        let roster = town.read().expect("lock poisoned").residents.clone();
        roster
            .into_iter()
            .filter_map(|id| self.universe.resident_by_id(id))
            .filter(|handle| {
                let resident = handle.read().expect("lock poisoned");
                resident
                    .player
                    .map(|p| self.presence.is_online(p))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Online members across every town of a nation.
    pub fn online_residents_of_nation(&self, nation_id: NationId) -> Vec<Handle<Resident>> {
        let Some(nation) = self.universe.nation_by_id(nation_id) else {
            return Vec::new();
        };
        let towns = nation.read().expect("lock poisoned").towns.clone();
        towns
            .into_iter()
            .flat_map(|town| self.online_residents_of_town(town))
            .collect()
    }

    pub fn town_spawn(&self, town_id: TownId) -> Option<Position> {
        let town = self.universe.town_by_id(town_id)?;
        let spawn = town.read().expect("lock poisoned").spawn;
        spawn
    }

    /// A nation's spawn is its capital's spawn.
    pub fn nation_spawn(&self, nation_id: NationId) -> Option<Position> {
        let nation = self.universe.nation_by_id(nation_id)?;
        let capital = nation.read().expect("lock poisoned").capital;
        self.town_spawn(capital)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;
    use crate::application::ports::outbound::NoPresence;
    use crate::domain::entities::World;
    use crate::domain::value_objects::PersistState;

    struct OnlineSet(HashSet<Uuid>);

    impl PresencePort for OnlineSet {
        fn is_online(&self, player: Uuid) -> bool {
            self.0.contains(&player)
        }
    }

    fn service_with(universe: Arc<Universe>, radius: u32) -> QueryService {
        QueryService::new(universe, Arc::new(NoPresence), radius)
    }

    #[test]
    fn test_classify_claims_disabled_world() {
        let universe = Arc::new(Universe::new());
        let world = World::new("void").with_claims_enabled(false);
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let service = service_with(Arc::clone(&universe), 0);
        let status = service.classify(BlockCoord::new(world_id, 0, 0));
        assert_eq!(status, TownBlockStatus::NotClaimable);
    }

    #[test]
    fn test_classify_owned_and_wilderness() {
        let universe = Arc::new(Universe::new());
        let world = World::new("overworld");
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let town = Town::new("alpha");
        let town_id = town.id;
        universe.register_town(town).unwrap();

        let coord = BlockCoord::new(world_id, 3, 3);
        let mut block = TownBlock::new(coord);
        block.town = Some(town_id);
        block.persist = PersistState::Clean;
        universe.register_town_block(block).unwrap();

        let service = service_with(Arc::clone(&universe), 0);
        assert_eq!(service.classify(coord), TownBlockStatus::TownOwned(town_id));
        assert_eq!(
            service.classify(BlockCoord::new(world_id, 9, 9)),
            TownBlockStatus::Wilderness
        );
    }

    #[test]
    fn test_classify_personal_owner() {
        let universe = Arc::new(Universe::new());
        let world = World::new("overworld");
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let mut town = Town::new("alpha");
        let town_id = town.id;
        let mut resident = Resident::new("bob");
        let resident_id = resident.id;
        resident.town = Some(town_id);
        town.residents.push(resident_id);
        universe.register_town(town).unwrap();
        universe.register_resident(resident).unwrap();

        let coord = BlockCoord::new(world_id, 1, 1);
        let mut block = TownBlock::new(coord);
        block.town = Some(town_id);
        block.resident = Some(resident_id);
        universe.register_town_block(block).unwrap();

        let service = service_with(Arc::clone(&universe), 0);
        assert_eq!(
            service.classify(coord),
            TownBlockStatus::PersonallyOwned {
                town: town_id,
                resident: resident_id,
            }
        );
    }

    #[test]
    fn test_nation_zone_surrounds_capital_home_block() {
        let universe = Arc::new(Universe::new());
        let world = World::new("overworld");
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let mut town = Town::new("capital");
        let town_id = town.id;
        let home_coord = BlockCoord::new(world_id, 0, 0);
        let mut home = TownBlock::new(home_coord);
        home.town = Some(town_id);
        let home_id = home.id;
        town.town_blocks.push(home_id);
        town.home_block = Some(home_id);

        let nation = Nation::new("empire", town_id);
        let nation_id = nation.id;
        town.nation = Some(nation_id);

        universe.register_town(town).unwrap();
        universe.register_town_block(home).unwrap();
        universe.register_nation(nation).unwrap();

        let service = service_with(Arc::clone(&universe), 2);
        assert_eq!(
            service.classify(BlockCoord::new(world_id, 2, -2)),
            TownBlockStatus::NationZone(nation_id)
        );
        assert_eq!(
            service.classify(BlockCoord::new(world_id, 3, 0)),
            TownBlockStatus::Wilderness
        );

        // Radius zero disables the zone outright.
        let disabled = service_with(Arc::clone(&universe), 0);
        assert_eq!(
            disabled.classify(BlockCoord::new(world_id, 1, 1)),
            TownBlockStatus::Wilderness
        );
    }

    #[test]
    fn test_nation_zone_respects_opt_out() {
        let universe = Arc::new(Universe::new());
        let world = World::new("overworld");
        let world_id = world.id;
        universe.register_world(world).unwrap();

        let mut town = Town::new("capital");
        let town_id = town.id;
        town.nation_zone_opt_out = true;
        let home_coord = BlockCoord::new(world_id, 0, 0);
        let mut home = TownBlock::new(home_coord);
        home.town = Some(town_id);
        let home_id = home.id;
        town.town_blocks.push(home_id);
        town.home_block = Some(home_id);

        let nation = Nation::new("empire", town_id);
        town.nation = Some(nation.id);

        universe.register_town(town).unwrap();
        universe.register_town_block(home).unwrap();
        universe.register_nation(nation).unwrap();

        let service = service_with(Arc::clone(&universe), 2);
        assert_eq!(
            service.classify(BlockCoord::new(world_id, 1, 1)),
            TownBlockStatus::Wilderness
        );
    }

    #[test]
    fn test_online_residents_filter_by_presence() {
        let universe = Arc::new(Universe::new());
        let online = Uuid::new_v4();
        let offline = Uuid::new_v4();

        let mut town = Town::new("alpha");
        let town_id = town.id;
        let mut a = Resident::new("ann").with_player(online);
        let mut b = Resident::new("ben").with_player(offline);
        a.town = Some(town_id);
        b.town = Some(town_id);
        town.residents.push(a.id);
        town.residents.push(b.id);
        universe.register_town(town).unwrap();
        universe.register_resident(a).unwrap();
        universe.register_resident(b).unwrap();

        let presence = Arc::new(OnlineSet(HashSet::from([online])));
        let service = QueryService::new(Arc::clone(&universe), presence, 0);

        let found = service.online_residents_of_town(town_id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].read().unwrap().name, "ann");
    }
}
