//! Startup load sequencing and rollback behavior.

use std::sync::Arc;

use tempfile::TempDir;

use demesne::domain::entities::{Resident, TownBlock, World};
use demesne::domain::value_objects::{BlockCoord, TownId};
use demesne::{
    DataSourcePort, DataStore, FlatFileDataSource, InMemoryDataSource, LoadPhase, Universe,
};

#[tokio::test]
async fn test_block_referencing_absent_town_aborts_at_block_phase() {
    let backend = Arc::new(InMemoryDataSource::new());

    // Seed a store whose town block points at a town that has no record:
    // exactly the shape left behind by a crash between two record writes.
    let world = World::new("w1");
    let world_id = world.id;
    backend.save_world(&world).await.unwrap();
    backend
        .save_resident(&Resident::new("bob"))
        .await
        .unwrap();
    let mut block = TownBlock::new(BlockCoord::new(world_id, 0, 0));
    block.town = Some(TownId::new());
    backend.save_town_block(&block).await.unwrap();

    let universe = Arc::new(Universe::new());
    let store = DataStore::new(Arc::clone(&universe), backend);

    let err = store.load_all().await.unwrap_err();
    assert_eq!(err.phase, LoadPhase::TownBlocks);

    // Phases before the failure stay loaded; the failing kind is rolled
    // back completely.
    assert!(universe.world("w1").is_some());
    assert!(universe.resident("bob").is_some());
    assert!(universe.town_blocks().is_empty());
    assert!(universe
        .town_block_at(BlockCoord::new(world_id, 0, 0))
        .is_none());
}

#[tokio::test]
async fn test_missing_world_record_rolls_back_everything() {
    // Needs a backend whose index files and record files can diverge, so
    // flat-file rather than in-memory: deleting the world record leaves
    // the stale entry in the worlds index.
    let dir = TempDir::new().unwrap();
    let universe = Arc::new(Universe::new());

    // A full, consistent store built through the normal write path.
    {
        let backend = Arc::new(FlatFileDataSource::open(dir.path()).await.unwrap());
        let store = DataStore::new(
            Arc::clone(&universe),
            Arc::clone(&backend) as Arc<dyn DataSourcePort>,
        );
        let world = store.new_world("w1").await.unwrap();
        let town = store.new_town("Alpha").await.unwrap();
        let town_id = town.read().unwrap().id;
        let world_id = world.read().unwrap().id;
        store
            .claim_block(town_id, BlockCoord::new(world_id, 1, 1))
            .await
            .unwrap();
        store.save_all().await;

        // Corrupt it: the world stays indexed but its record is gone.
        backend.delete_world(world_id).await.unwrap();
    }

    let universe = Arc::new(Universe::new());
    let backend = Arc::new(FlatFileDataSource::open(dir.path()).await.unwrap());
    let store = DataStore::new(Arc::clone(&universe), backend);
    let err = store.load_all().await.unwrap_err();
    assert_eq!(err.phase, LoadPhase::Worlds);

    // Worlds are the first record phase, so the rollback clears every kind.
    let counts = universe.counts();
    assert_eq!(counts.worlds, 0);
    assert_eq!(counts.towns, 0);
    assert_eq!(counts.town_blocks, 0);
}

#[tokio::test]
async fn test_store_reloads_after_jail_cell_unclaimed() {
    let backend = Arc::new(InMemoryDataSource::new());
    let universe = Arc::new(Universe::new());

    {
        let store = DataStore::new(
            Arc::clone(&universe),
            Arc::clone(&backend) as Arc<dyn DataSourcePort>,
        );
        let world = store.new_world("w1").await.unwrap();
        let world_id = world.read().unwrap().id;
        let town = store.new_town("Alpha").await.unwrap();
        let town_id = town.read().unwrap().id;

        let keep = store
            .claim_block(town_id, BlockCoord::new(world_id, 0, 0))
            .await
            .unwrap();
        let released = store
            .claim_block(town_id, BlockCoord::new(world_id, 0, 1))
            .await
            .unwrap();
        let keep_id = keep.read().unwrap().id;
        let released_id = released.read().unwrap().id;
        store
            .create_jail(town_id, "dungeon", vec![keep_id, released_id])
            .await
            .unwrap();

        store.unclaim_block(BlockCoord::new(world_id, 0, 1)).await.unwrap();
        let summary = store.save_all().await;
        assert_eq!(summary.failed, 0);
    }

    let universe = Arc::new(Universe::new());
    let store = DataStore::new(Arc::clone(&universe), backend);
    store.load_all().await.unwrap();

    let jail = universe.jail("dungeon").unwrap();
    assert_eq!(jail.read().unwrap().cells.len(), 1);
}

#[tokio::test]
async fn test_dangling_home_block_is_dropped_not_fatal() {
    let backend = Arc::new(InMemoryDataSource::new());
    let universe = Arc::new(Universe::new());

    {
        let store = DataStore::new(Arc::clone(&universe), Arc::clone(&backend) as Arc<dyn DataSourcePort>);
        let world = store.new_world("w1").await.unwrap();
        let world_id = world.read().unwrap().id;
        let town = store.new_town("Alpha").await.unwrap();
        let town_id = town.read().unwrap().id;
        store
            .claim_block(town_id, BlockCoord::new(world_id, 0, 0))
            .await
            .unwrap();
        store.save_all().await;

        // The stored town still names its home block, but the block record
        // and index entry are gone.
        let home = town.read().unwrap().home_block.unwrap();
        backend.delete_town_block(home).await.unwrap();
    }

    let universe = Arc::new(Universe::new());
    let store = DataStore::new(Arc::clone(&universe), backend);
    store.load_all().await.unwrap();

    let town = universe.town("Alpha").unwrap();
    assert!(town.read().unwrap().home_block.is_none());
}

#[tokio::test]
async fn test_empty_store_loads_clean() {
    let backend = Arc::new(InMemoryDataSource::new());
    let universe = Arc::new(Universe::new());
    let store = DataStore::new(Arc::clone(&universe), backend);

    store.load_all().await.unwrap();

    let counts = universe.counts();
    assert_eq!(counts.worlds, 0);
    assert_eq!(counts.residents, 0);
}
