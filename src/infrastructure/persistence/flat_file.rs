//! Flat-file storage adapter
//!
//! One pretty-printed JSON document per record, named by id, grouped in a
//! directory per entity kind. The list indices are JSON documents at the
//! data root. Writes go through a temp file and an atomic rename so a crash
//! never leaves a half-written record behind.
//!
//! Layout:
//! ```text
//! <root>/worlds.json              world index
//! <root>/worlds/<uuid>.json       world records
//! ... (towns, nations, residents, town_blocks, plot_groups, jails)
//! <root>/hibernated/<uuid>.json   cold resident records, by platform account
//! <root>/queues/regen.json        pending regenerations
//! <root>/queues/snapshot.json     pending snapshots
//! <root>/backups/<timestamp>/     point-in-time copies
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::outbound::{
    DataSourcePort, EntityStub, StorageError, TownBlockStub,
};
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::value_objects::{
    BlockCoord, JailId, NationId, PlotGroupId, ResidentId, TownBlockId, TownId, WorldId,
};

const RECORD_DIRS: &[&str] = &[
    "worlds",
    "towns",
    "nations",
    "residents",
    "town_blocks",
    "plot_groups",
    "jails",
    "hibernated",
    "queues",
];

pub struct FlatFileDataSource {
    root: PathBuf,
}

impl FlatFileDataSource {
    /// Open (and create if needed) a flat-file store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for dir in RECORD_DIRS {
            fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self { root })
    }

    fn record_path(&self, dir: &str, id: impl std::fmt::Display) -> PathBuf {
        self.root.join(dir).join(format!("{id}.json"))
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    async fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Missing)
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::Corrupt(format!("{}: {err}", path.display())))
    }

    /// Write via a sibling temp file and rename, so readers only ever see a
    /// complete document.
    async fn write_record<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|err| StorageError::Corrupt(err.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn delete_record(&self, path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// An absent index is an empty store, not an error.
    async fn read_index<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StorageError> {
        match self.read_record(&self.index_path(name)).await {
            Ok(list) => Ok(list),
            Err(StorageError::Missing) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl DataSourcePort for FlatFileDataSource {
    async fn backup(&self) -> Result<PathBuf, StorageError> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let dest_root = self.root.join("backups").join(stamp.to_string());
        fs::create_dir_all(&dest_root).await?;

        // Iterative directory walk; the backups directory itself is skipped
        // so backups never nest.
        let mut pending = vec![(self.root.clone(), dest_root.clone())];
        while let Some((src_dir, dst_dir)) = pending.pop() {
            fs::create_dir_all(&dst_dir).await?;
            let mut entries = fs::read_dir(&src_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let src = entry.path();
                if src == self.root.join("backups") {
                    continue;
                }
                let dst = dst_dir.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push((src, dst));
                } else {
                    fs::copy(&src, &dst).await?;
                }
            }
        }
        Ok(dest_root)
    }

    async fn finish_tasks(&self) -> Result<(), StorageError> {
        // Every write is flushed before its call returns.
        Ok(())
    }

    async fn world_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("worlds").await
    }

    async fn town_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("towns").await
    }

    async fn nation_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("nations").await
    }

    async fn resident_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("residents").await
    }

    async fn plot_group_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("plot_groups").await
    }

    async fn jail_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.read_index("jails").await
    }

    async fn town_block_list(&self) -> Result<Vec<TownBlockStub>, StorageError> {
        self.read_index("town_blocks").await
    }

    async fn save_world_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("worlds"), &stubs).await
    }

    async fn save_town_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("towns"), &stubs).await
    }

    async fn save_nation_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("nations"), &stubs).await
    }

    async fn save_resident_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("residents"), &stubs).await
    }

    async fn save_plot_group_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("plot_groups"), &stubs).await
    }

    async fn save_jail_list(&self, stubs: &[EntityStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("jails"), &stubs).await
    }

    async fn save_town_block_list(&self, stubs: &[TownBlockStub]) -> Result<(), StorageError> {
        self.write_record(&self.index_path("town_blocks"), &stubs).await
    }

    async fn load_world(&self, id: WorldId) -> Result<World, StorageError> {
        self.read_record(&self.record_path("worlds", id)).await
    }

    async fn save_world(&self, world: &World) -> Result<(), StorageError> {
        self.write_record(&self.record_path("worlds", world.id), world)
            .await
    }

    async fn delete_world(&self, id: WorldId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("worlds", id)).await
    }

    async fn load_town(&self, id: TownId) -> Result<Town, StorageError> {
        self.read_record(&self.record_path("towns", id)).await
    }

    async fn save_town(&self, town: &Town) -> Result<(), StorageError> {
        self.write_record(&self.record_path("towns", town.id), town)
            .await
    }

    async fn delete_town(&self, id: TownId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("towns", id)).await
    }

    async fn load_nation(&self, id: NationId) -> Result<Nation, StorageError> {
        self.read_record(&self.record_path("nations", id)).await
    }

    async fn save_nation(&self, nation: &Nation) -> Result<(), StorageError> {
        self.write_record(&self.record_path("nations", nation.id), nation)
            .await
    }

    async fn delete_nation(&self, id: NationId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("nations", id)).await
    }

    async fn load_resident(&self, id: ResidentId) -> Result<Resident, StorageError> {
        self.read_record(&self.record_path("residents", id)).await
    }

    async fn save_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        self.write_record(&self.record_path("residents", resident.id), resident)
            .await
    }

    async fn delete_resident(&self, id: ResidentId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("residents", id)).await
    }

    async fn load_town_block(&self, id: TownBlockId) -> Result<TownBlock, StorageError> {
        self.read_record(&self.record_path("town_blocks", id)).await
    }

    async fn save_town_block(&self, block: &TownBlock) -> Result<(), StorageError> {
        self.write_record(&self.record_path("town_blocks", block.id), block)
            .await
    }

    async fn delete_town_block(&self, id: TownBlockId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("town_blocks", id)).await
    }

    async fn load_plot_group(&self, id: PlotGroupId) -> Result<PlotGroup, StorageError> {
        self.read_record(&self.record_path("plot_groups", id)).await
    }

    async fn save_plot_group(&self, group: &PlotGroup) -> Result<(), StorageError> {
        self.write_record(&self.record_path("plot_groups", group.id), group)
            .await
    }

    async fn delete_plot_group(&self, id: PlotGroupId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("plot_groups", id)).await
    }

    async fn load_jail(&self, id: JailId) -> Result<Jail, StorageError> {
        self.read_record(&self.record_path("jails", id)).await
    }

    async fn save_jail(&self, jail: &Jail) -> Result<(), StorageError> {
        self.write_record(&self.record_path("jails", jail.id), jail)
            .await
    }

    async fn delete_jail(&self, id: JailId) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("jails", id)).await
    }

    async fn hibernated_resident_list(&self) -> Result<Vec<Uuid>, StorageError> {
        let mut players = Vec::new();
        let mut entries = fs::read_dir(self.root.join("hibernated")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = Path::new(&name).file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(player) = stem.parse::<Uuid>() {
                players.push(player);
            }
        }
        Ok(players)
    }

    async fn load_hibernated_resident(&self, player: Uuid) -> Result<Resident, StorageError> {
        self.read_record(&self.record_path("hibernated", player)).await
    }

    async fn save_hibernated_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        let player = resident.player.ok_or_else(|| {
            StorageError::Corrupt("hibernated resident without platform account".to_string())
        })?;
        self.write_record(&self.record_path("hibernated", player), resident)
            .await
    }

    async fn delete_hibernated_resident(&self, player: Uuid) -> Result<(), StorageError> {
        self.delete_record(&self.record_path("hibernated", player))
            .await
    }

    async fn load_regen_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        self.read_record(&self.root.join("queues").join("regen.json"))
            .await
    }

    async fn save_regen_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.write_record(&self.root.join("queues").join("regen.json"), &queue)
            .await
    }

    async fn load_snapshot_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        self.read_record(&self.root.join("queues").join("snapshot.json"))
            .await
    }

    async fn save_snapshot_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.write_record(&self.root.join("queues").join("snapshot.json"), &queue)
            .await
    }
}
