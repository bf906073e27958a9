//! SQLite storage adapter
//!
//! One table per entity kind, each row holding the record's id, its name
//! (the index columns) and the full JSON document. The list operations
//! read only the index columns, so startup indexing never decodes full
//! records except for town blocks, whose index entry needs the coordinate
//! out of the document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::application::ports::outbound::{
    DataSourcePort, EntityStub, StorageError, TownBlockStub,
};
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::value_objects::{
    BlockCoord, JailId, NationId, PlotGroupId, ResidentId, TownBlockId, TownId, WorldId,
};

const ENTITY_TABLES: &[&str] = &[
    "worlds",
    "towns",
    "nations",
    "residents",
    "town_blocks",
    "plot_groups",
    "jails",
];

fn db_err(err: sqlx::Error) -> StorageError {
    StorageError::Io(err.to_string())
}

fn corrupt(err: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt(err.to_string())
}

pub struct SqliteDataSource {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteDataSource {
    /// Open (and create if needed) the database file and its schema.
    pub async fn connect(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(db_err)?;

        for table in ENTITY_TABLES {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    data TEXT NOT NULL
                )"
            );
            sqlx::query(&sql).execute(&pool).await.map_err(db_err)?;
        }
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hibernated_residents (
                player TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS work_queues (
                name TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<T, StorageError> {
        let sql = format!("SELECT data FROM {table} WHERE id = ?");
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let (data,) = row.ok_or(StorageError::Missing)?;
        serde_json::from_str(&data).map_err(corrupt)
    }

    async fn upsert<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        name: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_string(value).map_err(corrupt)?;
        let sql = format!("INSERT OR REPLACE INTO {table} (id, name, data) VALUES (?, ?, ?)");
        sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove(&self, table: &str, id: &str) -> Result<(), StorageError> {
        let sql = format!("DELETE FROM {table} WHERE id = ?");
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn stub_list(&self, table: &str) -> Result<Vec<EntityStub>, StorageError> {
        let sql = format!("SELECT id, name FROM {table}");
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(id, name)| {
                let id = id.parse::<Uuid>().map_err(corrupt)?;
                Ok(EntityStub::new(id, name))
            })
            .collect()
    }

    async fn queue(&self, name: &str) -> Result<Vec<BlockCoord>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM work_queues WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let (data,) = row.ok_or(StorageError::Missing)?;
        serde_json::from_str(&data).map_err(corrupt)
    }

    async fn save_queue(&self, name: &str, queue: &[BlockCoord]) -> Result<(), StorageError> {
        let data = serde_json::to_string(queue).map_err(corrupt)?;
        sqlx::query("INSERT OR REPLACE INTO work_queues (name, data) VALUES (?, ?)")
            .bind(name)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl DataSourcePort for SqliteDataSource {
    async fn backup(&self) -> Result<PathBuf, StorageError> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "demesne.db".to_string());
        name.push_str(&format!(".backup-{stamp}"));
        let dest = self.path.with_file_name(name);

        // VACUUM INTO does not take bind parameters; quote the spliced
        // path so a `'` in it cannot break the statement.
        let quoted = dest.display().to_string().replace('\'', "''");
        let sql = format!("VACUUM INTO '{quoted}'");
        sqlx::query(&sql).execute(&self.pool).await.map_err(db_err)?;
        Ok(dest)
    }

    async fn finish_tasks(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }

    async fn world_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("worlds").await
    }

    async fn town_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("towns").await
    }

    async fn nation_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("nations").await
    }

    async fn resident_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("residents").await
    }

    async fn plot_group_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("plot_groups").await
    }

    async fn jail_list(&self) -> Result<Vec<EntityStub>, StorageError> {
        self.stub_list("jails").await
    }

    async fn town_block_list(&self) -> Result<Vec<TownBlockStub>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT data FROM town_blocks")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(data,)| {
                let block: TownBlock = serde_json::from_str(&data).map_err(corrupt)?;
                Ok(TownBlockStub {
                    id: block.id,
                    coord: block.coord,
                })
            })
            .collect()
    }

    // The row columns double as the index; the explicit index writes have
    // nothing extra to record.

    async fn save_world_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_town_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_nation_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_resident_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_plot_group_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_jail_list(&self, _stubs: &[EntityStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_town_block_list(&self, _stubs: &[TownBlockStub]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load_world(&self, id: WorldId) -> Result<World, StorageError> {
        self.fetch("worlds", &id.to_string()).await
    }

    async fn save_world(&self, world: &World) -> Result<(), StorageError> {
        self.upsert("worlds", &world.id.to_string(), &world.name, world)
            .await
    }

    async fn delete_world(&self, id: WorldId) -> Result<(), StorageError> {
        self.remove("worlds", &id.to_string()).await
    }

    async fn load_town(&self, id: TownId) -> Result<Town, StorageError> {
        self.fetch("towns", &id.to_string()).await
    }

    async fn save_town(&self, town: &Town) -> Result<(), StorageError> {
        self.upsert("towns", &town.id.to_string(), &town.name, town)
            .await
    }

    async fn delete_town(&self, id: TownId) -> Result<(), StorageError> {
        self.remove("towns", &id.to_string()).await
    }

    async fn load_nation(&self, id: NationId) -> Result<Nation, StorageError> {
        self.fetch("nations", &id.to_string()).await
    }

    async fn save_nation(&self, nation: &Nation) -> Result<(), StorageError> {
        self.upsert("nations", &nation.id.to_string(), &nation.name, nation)
            .await
    }

    async fn delete_nation(&self, id: NationId) -> Result<(), StorageError> {
        self.remove("nations", &id.to_string()).await
    }

    async fn load_resident(&self, id: ResidentId) -> Result<Resident, StorageError> {
        self.fetch("residents", &id.to_string()).await
    }

    async fn save_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        self.upsert("residents", &resident.id.to_string(), &resident.name, resident)
            .await
    }

    async fn delete_resident(&self, id: ResidentId) -> Result<(), StorageError> {
        self.remove("residents", &id.to_string()).await
    }

    async fn load_town_block(&self, id: TownBlockId) -> Result<TownBlock, StorageError> {
        self.fetch("town_blocks", &id.to_string()).await
    }

    async fn save_town_block(&self, block: &TownBlock) -> Result<(), StorageError> {
        self.upsert(
            "town_blocks",
            &block.id.to_string(),
            &block.display_name(),
            block,
        )
        .await
    }

    async fn delete_town_block(&self, id: TownBlockId) -> Result<(), StorageError> {
        self.remove("town_blocks", &id.to_string()).await
    }

    async fn load_plot_group(&self, id: PlotGroupId) -> Result<PlotGroup, StorageError> {
        self.fetch("plot_groups", &id.to_string()).await
    }

    async fn save_plot_group(&self, group: &PlotGroup) -> Result<(), StorageError> {
        self.upsert("plot_groups", &group.id.to_string(), &group.name, group)
            .await
    }

    async fn delete_plot_group(&self, id: PlotGroupId) -> Result<(), StorageError> {
        self.remove("plot_groups", &id.to_string()).await
    }

    async fn load_jail(&self, id: JailId) -> Result<Jail, StorageError> {
        self.fetch("jails", &id.to_string()).await
    }

    async fn save_jail(&self, jail: &Jail) -> Result<(), StorageError> {
        self.upsert("jails", &jail.id.to_string(), &jail.name, jail)
            .await
    }

    async fn delete_jail(&self, id: JailId) -> Result<(), StorageError> {
        self.remove("jails", &id.to_string()).await
    }

    async fn hibernated_resident_list(&self) -> Result<Vec<Uuid>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT player FROM hibernated_residents")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(player,)| player.parse::<Uuid>().map_err(corrupt))
            .collect()
    }

    async fn load_hibernated_resident(&self, player: Uuid) -> Result<Resident, StorageError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM hibernated_residents WHERE player = ?")
                .bind(player.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let (data,) = row.ok_or(StorageError::Missing)?;
        serde_json::from_str(&data).map_err(corrupt)
    }

    async fn save_hibernated_resident(&self, resident: &Resident) -> Result<(), StorageError> {
        let player = resident.player.ok_or_else(|| {
            StorageError::Corrupt("hibernated resident without platform account".to_string())
        })?;
        let data = serde_json::to_string(resident).map_err(corrupt)?;
        sqlx::query("INSERT OR REPLACE INTO hibernated_residents (player, data) VALUES (?, ?)")
            .bind(player.to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_hibernated_resident(&self, player: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM hibernated_residents WHERE player = ?")
            .bind(player.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_regen_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        self.queue("regen").await
    }

    async fn save_regen_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.save_queue("regen", queue).await
    }

    async fn load_snapshot_queue(&self) -> Result<Vec<BlockCoord>, StorageError> {
        self.queue("snapshot").await
    }

    async fn save_snapshot_queue(&self, queue: &[BlockCoord]) -> Result<(), StorageError> {
        self.save_queue("snapshot", queue).await
    }
}
