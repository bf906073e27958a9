//! Full persistence round trips through the durable backends.
//!
//! Each test builds a populated graph through the normal write path, drops
//! it, reloads into a fresh universe from the same storage, and checks the
//! reloaded graph field by field.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use demesne::domain::value_objects::{BlockCoord, Position};
use demesne::{
    DataSourcePort, DataStore, FlatFileDataSource, SqliteDataSource, Universe,
};

struct Seeded {
    world_id: demesne::domain::value_objects::WorldId,
    home: BlockCoord,
    shop: BlockCoord,
    hibernated_player: Uuid,
}

/// Populate a backend with one of everything, then flush it.
async fn seed(backend: Arc<dyn DataSourcePort>) -> Seeded {
    let universe = Arc::new(Universe::new());
    let store = DataStore::new(universe, backend);

    let world = store.new_world("overworld").await.unwrap();
    let world_id = world.read().unwrap().id;
    let town = store.new_town("Alpha").await.unwrap();
    let town_id = town.read().unwrap().id;

    let player = Uuid::new_v4();
    let resident = store.new_resident("bob", Some(player)).await.unwrap();
    let resident_id = resident.read().unwrap().id;
    store
        .add_resident_to_town(resident_id, town_id)
        .await
        .unwrap();

    let home = BlockCoord::new(world_id, 0, 0);
    let shop = BlockCoord::new(world_id, 0, 1);
    store.claim_block(town_id, home).await.unwrap();
    let shop_block = store.claim_block(town_id, shop).await.unwrap();
    let shop_id = shop_block.read().unwrap().id;
    store
        .set_block_resident(shop, Some(resident_id))
        .await
        .unwrap();
    store
        .set_spawn(town_id, Position::new(world_id, 8.0, 64.0, 8.0))
        .await
        .unwrap();

    store.new_nation("Empire", town_id).await.unwrap();
    store
        .create_plot_group(town_id, "market", shop_id)
        .await
        .unwrap();
    store
        .create_jail(town_id, "dungeon", vec![shop_id])
        .await
        .unwrap();

    // Queues and a hibernated resident round-trip too.
    let universe = store.universe();
    universe.push_regen(home);
    universe.push_snapshot(shop);
    store.save_queues().await;

    let hibernated_player = Uuid::new_v4();
    let sleeper = store
        .new_resident("carol", Some(hibernated_player))
        .await
        .unwrap();
    let sleeper_id = sleeper.read().unwrap().id;
    store.hibernate_resident(sleeper_id).await.unwrap();

    let summary = store.save_all().await;
    assert!(summary.all_ok());
    store.finish_tasks().await.unwrap();

    Seeded {
        world_id,
        home,
        shop,
        hibernated_player,
    }
}

/// Reload from the same storage and verify everything came back connected.
async fn verify(backend: Arc<dyn DataSourcePort>, seeded: &Seeded) {
    let universe = Arc::new(Universe::new());
    let store = DataStore::new(Arc::clone(&universe), backend);
    store.load_all().await.unwrap();

    let counts = universe.counts();
    assert_eq!(counts.worlds, 1);
    assert_eq!(counts.towns, 1);
    assert_eq!(counts.nations, 1);
    assert_eq!(counts.residents, 1);
    assert_eq!(counts.town_blocks, 2);
    assert_eq!(counts.plot_groups, 1);
    assert_eq!(counts.jails, 1);

    let world = universe.world("overworld").unwrap();
    assert_eq!(world.read().unwrap().id, seeded.world_id);
    assert!(world.read().unwrap().claims_enabled);

    let town = universe.town("Alpha").unwrap();
    let town_id = town.read().unwrap().id;
    let resident = universe.resident("bob").unwrap();
    let resident_id = resident.read().unwrap().id;
    assert_eq!(resident.read().unwrap().town, Some(town_id));
    assert!(town.read().unwrap().has_resident(resident_id));
    assert!(town.read().unwrap().spawn.is_some());

    let nation = universe.nation("Empire").unwrap();
    assert_eq!(nation.read().unwrap().capital, town_id);
    assert_eq!(town.read().unwrap().nation, Some(nation.read().unwrap().id));

    let home = universe.town_block_at(seeded.home).unwrap();
    assert_eq!(home.read().unwrap().town, Some(town_id));
    assert_eq!(town.read().unwrap().home_block, Some(home.read().unwrap().id));

    let shop = universe.town_block_at(seeded.shop).unwrap();
    let shop_id = {
        let shop = shop.read().unwrap();
        assert_eq!(shop.resident, Some(resident_id));
        let group = universe.plot_group("market").unwrap();
        assert_eq!(group.read().unwrap().blocks, vec![shop.id]);
        assert_eq!(shop.plot_group, Some(group.read().unwrap().id));
        shop.id
    };

    let jail = universe.jail("dungeon").unwrap();
    assert_eq!(jail.read().unwrap().town, town_id);
    assert_eq!(jail.read().unwrap().cells, vec![shop_id]);

    assert_eq!(universe.regen_queue(), vec![seeded.home]);
    assert_eq!(universe.snapshot_queue(), vec![seeded.shop]);

    assert!(universe.is_hibernated(seeded.hibernated_player));
    assert!(universe.resident("carol").is_none());

    // The hibernated record itself is loadable on demand.
    let woken = store.wake_resident(seeded.hibernated_player).await.unwrap();
    assert_eq!(woken.read().unwrap().name, "carol");
    assert!(!universe.is_hibernated(seeded.hibernated_player));
}

#[tokio::test]
async fn test_flat_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let seeded = seed(Arc::new(
        FlatFileDataSource::open(dir.path()).await.unwrap(),
    ))
    .await;
    verify(
        Arc::new(FlatFileDataSource::open(dir.path()).await.unwrap()),
        &seeded,
    )
    .await;
}

#[tokio::test]
async fn test_sqlite_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("demesne.db");
    let seeded = seed(Arc::new(SqliteDataSource::connect(&db).await.unwrap())).await;
    verify(Arc::new(SqliteDataSource::connect(&db).await.unwrap()), &seeded).await;
}

#[tokio::test]
async fn test_flat_file_backup_copies_store() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlatFileDataSource::open(dir.path()).await.unwrap());
    seed(Arc::clone(&backend) as Arc<dyn DataSourcePort>).await;

    let dest = backend.backup().await.unwrap();
    assert!(dest.starts_with(dir.path()));
    assert!(Path::new(&dest).join("worlds.json").exists());

    // A backup of a backup never nests.
    assert!(!dest.join("backups").exists());
}

#[tokio::test]
async fn test_flat_file_record_dirs_match_index_names() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlatFileDataSource::open(dir.path()).await.unwrap());
    seed(Arc::clone(&backend) as Arc<dyn DataSourcePort>).await;

    // Each kind's record directory carries the same name as its index file.
    for kind in [
        "worlds",
        "towns",
        "nations",
        "residents",
        "town_blocks",
        "plot_groups",
        "jails",
    ] {
        assert!(dir.path().join(kind).is_dir(), "missing {kind}/ directory");
        assert!(
            dir.path().join(format!("{kind}.json")).is_file(),
            "missing {kind}.json index"
        );
    }
}

#[tokio::test]
async fn test_sqlite_backup_handles_quote_in_path() {
    let dir = TempDir::new().unwrap();
    let quoted = dir.path().join("ops' data");
    std::fs::create_dir_all(&quoted).unwrap();
    let db = quoted.join("demesne.db");

    // Seed by hand; the pool has to stay open for the backup call.
    let backend = Arc::new(SqliteDataSource::connect(&db).await.unwrap());
    let universe = Arc::new(Universe::new());
    let store = DataStore::new(universe, Arc::clone(&backend) as Arc<dyn DataSourcePort>);
    store.new_world("overworld").await.unwrap();
    let summary = store.save_all().await;
    assert!(summary.all_ok());

    let dest = backend.backup().await.unwrap();
    assert!(dest.exists());

    // The copy is a usable store in its own right.
    let copy = Arc::new(SqliteDataSource::connect(&dest).await.unwrap());
    assert!(!copy.world_list().await.unwrap().is_empty());
}
