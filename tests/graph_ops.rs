//! End-to-end graph mutation scenarios against the in-memory backend.

use std::sync::Arc;

use uuid::Uuid;

use demesne::domain::value_objects::BlockCoord;
use demesne::{DataStore, GraphError, InMemoryDataSource, Universe};

async fn fresh_store() -> Arc<DataStore> {
    let universe = Arc::new(Universe::new());
    let backend = Arc::new(InMemoryDataSource::new());
    Arc::new(DataStore::new(universe, backend))
}

#[tokio::test]
async fn test_rename_preserves_identity_and_references() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;
    let resident = store
        .new_resident("bob", Some(Uuid::new_v4()))
        .await
        .unwrap();
    let resident_id = resident.read().unwrap().id;

    store
        .claim_block(town_id, BlockCoord::new(world_id, 0, 0))
        .await
        .unwrap();
    store
        .add_resident_to_town(resident_id, town_id)
        .await
        .unwrap();
    let nation = store.new_nation("Empire", town_id).await.unwrap();
    let nation_id = nation.read().unwrap().id;

    store.rename_town(town_id, "Beta").await.unwrap();

    // The old name is gone, the new one resolves to the same entity.
    assert!(universe.town("Alpha").is_none());
    let renamed = universe.town("Beta").unwrap();
    assert_eq!(renamed.read().unwrap().id, town_id);

    // Id-routed references never noticed the rename.
    assert_eq!(resident.read().unwrap().town, Some(town_id));
    assert_eq!(nation.read().unwrap().capital, town_id);
    assert_eq!(
        universe.nation_by_id(nation_id).unwrap().read().unwrap().towns,
        vec![town_id]
    );
}

#[tokio::test]
async fn test_rename_rejects_duplicate_and_invalid_names() {
    let store = fresh_store().await;

    let alpha = store.new_town("Alpha").await.unwrap();
    let alpha_id = alpha.read().unwrap().id;
    store.new_town("Beta").await.unwrap();

    let err = store.rename_town(alpha_id, "BETA").await.unwrap_err();
    assert!(matches!(err, GraphError::AlreadyRegistered { .. }));

    let err = store.rename_town(alpha_id, "spawn").await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidName { .. }));

    // Failed renames leave the original intact.
    assert_eq!(alpha.read().unwrap().name, "Alpha");
}

#[tokio::test]
async fn test_delete_town_severs_every_reference() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;
    let resident = store.new_resident("bob", None).await.unwrap();
    let resident_id = resident.read().unwrap().id;

    let coord = BlockCoord::new(world_id, 0, 0);
    store.claim_block(town_id, coord).await.unwrap();
    store
        .add_resident_to_town(resident_id, town_id)
        .await
        .unwrap();
    store.new_nation("Empire", town_id).await.unwrap();

    store.delete_town(town_id).await.unwrap();

    // The resident survives townless; the block and the one-town nation
    // do not survive at all.
    assert!(universe.town("Alpha").is_none());
    assert!(resident.read().unwrap().town.is_none());
    assert!(universe.resident("bob").is_some());
    assert!(universe.town_block_at(coord).is_none());
    assert!(universe.nation("Empire").is_none());

    // The name is reusable immediately.
    assert!(store.new_town("Alpha").await.is_ok());
}

#[tokio::test]
async fn test_capital_reassigned_when_capital_town_deleted() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let capital = store.new_town("Capital").await.unwrap();
    let capital_id = capital.read().unwrap().id;
    let other = store.new_town("Other").await.unwrap();
    let other_id = other.read().unwrap().id;

    let nation = store.new_nation("Empire", capital_id).await.unwrap();
    let nation_id = nation.read().unwrap().id;
    {
        // Second town joins by hand; there is no join operation for towns
        // beyond the capital in this scenario's scope.
        let mut n = nation.write().unwrap();
        n.towns.push(other_id);
    }
    {
        let mut t = other.write().unwrap();
        t.nation = Some(nation_id);
    }

    store.delete_town(capital_id).await.unwrap();

    let nation = universe.nation_by_id(nation_id).unwrap();
    let nation = nation.read().unwrap();
    assert_eq!(nation.capital, other_id);
    assert_eq!(nation.towns, vec![other_id]);
}

#[tokio::test]
async fn test_plot_group_deleted_with_last_block() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;

    let a = store
        .claim_block(town_id, BlockCoord::new(world_id, 0, 0))
        .await
        .unwrap();
    let b = store
        .claim_block(town_id, BlockCoord::new(world_id, 0, 1))
        .await
        .unwrap();
    let a_id = a.read().unwrap().id;
    let b_id = b.read().unwrap().id;

    let group = store
        .create_plot_group(town_id, "market", a_id)
        .await
        .unwrap();
    let group_id = group.read().unwrap().id;
    store.add_block_to_group(group_id, b_id).await.unwrap();
    assert_eq!(group.read().unwrap().blocks.len(), 2);

    store.remove_block_from_group(a_id).await.unwrap();
    assert!(universe.plot_group("market").is_some());

    store.remove_block_from_group(b_id).await.unwrap();
    assert!(universe.plot_group("market").is_none());
    assert!(b.read().unwrap().plot_group.is_none());
}

#[tokio::test]
async fn test_unclaiming_home_block_clears_spawn() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;

    let coord = BlockCoord::new(world_id, 0, 0);
    store.claim_block(town_id, coord).await.unwrap();
    assert!(town.read().unwrap().home_block.is_some());
    store
        .set_spawn(
            town_id,
            demesne::domain::value_objects::Position::new(world_id, 4.0, 64.0, 4.0),
        )
        .await
        .unwrap();

    store.unclaim_block(coord).await.unwrap();

    let town = universe.town_by_id(town_id).unwrap();
    let town = town.read().unwrap();
    assert!(town.home_block.is_none());
    assert!(town.spawn.is_none());
    assert!(town.town_blocks.is_empty());
}

#[tokio::test]
async fn test_nation_merge_is_atomic_under_inconsistency() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let a_town = store.new_town("Atown").await.unwrap();
    let a_town_id = a_town.read().unwrap().id;
    let b_town = store.new_town("Btown").await.unwrap();
    let b_town_id = b_town.read().unwrap().id;

    let source = store.new_nation("Source", a_town_id).await.unwrap();
    let source_id = source.read().unwrap().id;
    let target = store.new_nation("Target", b_town_id).await.unwrap();
    let target_id = target.read().unwrap().id;

    // Corrupt the back-reference: the source nation still lists its town,
    // but the town no longer claims the nation.
    a_town.write().unwrap().nation = None;

    let err = store.merge_nations(source_id, target_id).await.unwrap_err();
    assert!(matches!(err, GraphError::InvariantViolation(_)));

    // Nothing moved.
    assert!(universe.nation("Source").is_some());
    assert_eq!(target.read().unwrap().towns, vec![b_town_id]);

    // Restore consistency and the merge goes through completely.
    a_town.write().unwrap().nation = Some(source_id);
    store.merge_nations(source_id, target_id).await.unwrap();

    assert!(universe.nation("Source").is_none());
    let target = target.read().unwrap();
    assert_eq!(target.towns, vec![b_town_id, a_town_id]);
    assert_eq!(target.capital, b_town_id);
    assert_eq!(a_town.read().unwrap().nation, Some(target_id));
}

#[tokio::test]
async fn test_town_merge_moves_everything_and_deletes_source() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let source = store.new_town("Old").await.unwrap();
    let source_id = source.read().unwrap().id;
    let target = store.new_town("Newtown").await.unwrap();
    let target_id = target.read().unwrap().id;

    let resident = store.new_resident("bob", None).await.unwrap();
    let resident_id = resident.read().unwrap().id;
    store
        .add_resident_to_town(resident_id, source_id)
        .await
        .unwrap();
    let coord = BlockCoord::new(world_id, 5, 5);
    store.claim_block(source_id, coord).await.unwrap();

    store.merge_towns(source_id, target_id).await.unwrap();

    assert!(universe.town("Old").is_none());
    assert_eq!(resident.read().unwrap().town, Some(target_id));
    let block = universe.town_block_at(coord).unwrap();
    assert_eq!(block.read().unwrap().town, Some(target_id));
    let target = target.read().unwrap();
    assert!(target.residents.contains(&resident_id));
}

#[tokio::test]
async fn test_unclaim_prunes_jail_cells_and_deletes_emptied_jail() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;

    let a_coord = BlockCoord::new(world_id, 0, 0);
    let b_coord = BlockCoord::new(world_id, 0, 1);
    let a = store.claim_block(town_id, a_coord).await.unwrap();
    let b = store.claim_block(town_id, b_coord).await.unwrap();
    let a_id = a.read().unwrap().id;
    let b_id = b.read().unwrap().id;

    let jail = store
        .create_jail(town_id, "dungeon", vec![a_id, b_id])
        .await
        .unwrap();

    store.unclaim_block(b_coord).await.unwrap();
    assert_eq!(jail.read().unwrap().cells, vec![a_id]);

    store.unclaim_block(a_coord).await.unwrap();
    assert!(universe.jail("dungeon").is_none());
}

#[tokio::test]
async fn test_leaving_last_resident_deletes_town() {
    let store = fresh_store().await;
    let universe = Arc::clone(store.universe());

    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;
    let resident = store.new_resident("bob", None).await.unwrap();
    let resident_id = resident.read().unwrap().id;
    store
        .add_resident_to_town(resident_id, town_id)
        .await
        .unwrap();

    store.remove_resident_from_town(resident_id).await.unwrap();

    assert!(universe.town_by_id(town_id).is_none());
    assert!(resident.read().unwrap().town.is_none());
}

#[tokio::test]
async fn test_claims_disabled_world_rejects_claims() {
    let store = fresh_store().await;

    let world = store.new_world("void").await.unwrap();
    let world_id = world.read().unwrap().id;
    world.write().unwrap().claims_enabled = false;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;

    let err = store
        .claim_block(town_id, BlockCoord::new(world_id, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvariantViolation(_)));
}

#[tokio::test]
async fn test_block_owner_must_be_member() {
    let store = fresh_store().await;

    let world = store.new_world("w1").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;
    let outsider = store.new_resident("eve", None).await.unwrap();
    let outsider_id = outsider.read().unwrap().id;

    let coord = BlockCoord::new(world_id, 0, 0);
    store.claim_block(town_id, coord).await.unwrap();

    let err = store
        .set_block_resident(coord, Some(outsider_id))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvariantViolation(_)));

    store.add_resident_to_town(outsider_id, town_id).await.unwrap();
    store
        .set_block_resident(coord, Some(outsider_id))
        .await
        .unwrap();
}
