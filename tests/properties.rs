//! Property tests: arbitrary op sequences never break referential integrity.
//!
//! Names and coordinates are drawn from tiny pools so sequences collide
//! constantly (duplicate founds, claims of claimed blocks, joins of members).
//! Individual op failures are expected and ignored; what must hold is that
//! the graph stays mutually consistent after every sequence.

use std::sync::Arc;

use proptest::prelude::*;
use tokio::runtime::Runtime;

use demesne::domain::value_objects::BlockCoord;
use demesne::{DataStore, InMemoryDataSource, Universe};

#[derive(Debug, Clone)]
enum Op {
    FoundTown(&'static str),
    Register(&'static str),
    Join(&'static str, &'static str),
    Leave(&'static str),
    Claim(&'static str, i32, i32),
    Unclaim(i32, i32),
    DeleteTown(&'static str),
}

const TOWNS: [&str; 3] = ["Alpha", "Beta", "Gamma"];
const PEOPLE: [&str; 4] = ["ann", "bob", "cyd", "dee"];

fn town_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&TOWNS[..])
}

fn person_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&PEOPLE[..])
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        town_name().prop_map(Op::FoundTown),
        person_name().prop_map(Op::Register),
        (person_name(), town_name()).prop_map(|(p, t)| Op::Join(p, t)),
        person_name().prop_map(Op::Leave),
        (town_name(), 0..3i32, 0..3i32).prop_map(|(t, x, z)| Op::Claim(t, x, z)),
        (0..3i32, 0..3i32).prop_map(|(x, z)| Op::Unclaim(x, z)),
        town_name().prop_map(Op::DeleteTown),
    ]
}

async fn apply(store: &DataStore, universe: &Universe, op: Op) {
    let world_id = match universe.world("w1") {
        Some(world) => world.read().unwrap().id,
        None => return,
    };
    match op {
        Op::FoundTown(name) => {
            let _ = store.new_town(name).await;
        }
        Op::Register(name) => {
            let _ = store.new_resident(name, None).await;
        }
        Op::Join(person, town) => {
            let (Some(resident), Some(town)) = (universe.resident(person), universe.town(town))
            else {
                return;
            };
            let resident_id = resident.read().unwrap().id;
            let town_id = town.read().unwrap().id;
            let _ = store.add_resident_to_town(resident_id, town_id).await;
        }
        Op::Leave(person) => {
            let Some(resident) = universe.resident(person) else {
                return;
            };
            let resident_id = resident.read().unwrap().id;
            let _ = store.remove_resident_from_town(resident_id).await;
        }
        Op::Claim(town, x, z) => {
            let Some(town) = universe.town(town) else {
                return;
            };
            let town_id = town.read().unwrap().id;
            let _ = store
                .claim_block(town_id, BlockCoord::new(world_id, x, z))
                .await;
        }
        Op::Unclaim(x, z) => {
            let _ = store.unclaim_block(BlockCoord::new(world_id, x, z)).await;
        }
        Op::DeleteTown(town) => {
            let Some(town) = universe.town(town) else {
                return;
            };
            let town_id = town.read().unwrap().id;
            let _ = store.delete_town(town_id).await;
        }
    }
}

fn check_integrity(universe: &Universe) {
    // Residents and towns agree on membership, both directions.
    for handle in universe.residents() {
        let resident = handle.read().unwrap();
        if let Some(town_id) = resident.town {
            let town = universe
                .town_by_id(town_id)
                .unwrap_or_else(|| panic!("resident {} points at missing town", resident.name));
            assert!(
                town.read().unwrap().has_resident(resident.id),
                "town roster missing resident {}",
                resident.name
            );
        }
    }
    // Freshly founded towns legitimately have no residents yet; a roster
    // emptied by its last member leaving must take the town with it.
    for handle in universe.towns() {
        let town = handle.read().unwrap();
        for resident_id in &town.residents {
            let resident = universe
                .resident_by_id(*resident_id)
                .unwrap_or_else(|| panic!("town {} lists a missing resident", town.name));
            assert_eq!(resident.read().unwrap().town, Some(town.id));
        }
        // Claims agree in both directions and the coord index resolves.
        for block_id in &town.town_blocks {
            let block = universe
                .town_block(*block_id)
                .unwrap_or_else(|| panic!("town {} lists a missing block", town.name));
            let block = block.read().unwrap();
            assert_eq!(block.town, Some(town.id));
            let at = universe.town_block_at(block.coord).expect("coord index lost a block");
            assert_eq!(at.read().unwrap().id, block.id);
        }
        if let Some(home) = town.home_block {
            assert!(town.town_blocks.contains(&home), "home block not claimed");
        }
    }
    for handle in universe.town_blocks() {
        let block = handle.read().unwrap();
        if let Some(town_id) = block.town {
            let town = universe
                .town_by_id(town_id)
                .expect("block points at missing town");
            let town = town.read().unwrap();
            assert!(town.town_blocks.contains(&block.id));
            if let Some(owner) = block.resident {
                assert!(
                    town.has_resident(owner),
                    "block owner is not a member of {}",
                    town.name
                );
            }
        } else {
            assert!(block.resident.is_none(), "wilderness block has an owner");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn op_sequences_preserve_referential_integrity(ops in prop::collection::vec(op(), 1..40)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let universe = Arc::new(Universe::new());
            let backend = Arc::new(InMemoryDataSource::new());
            let store = DataStore::new(Arc::clone(&universe), backend);
            store.new_world("w1").await.unwrap();

            for op in ops {
                apply(&store, &universe, op).await;
            }
            check_integrity(&universe);
        });
    }
}
