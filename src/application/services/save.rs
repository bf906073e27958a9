//! Save orchestrator - value-copy flush of the in-memory graph
//!
//! Saves never mutate the graph structure: each entity is cloned under its
//! own lock and the copy is written without holding anything. The list
//! indices go out first so a crash mid-sweep leaves an index that names at
//! worst a few entities with stale records, never records with no index.
//! One failed entity is logged and counted, the sweep continues.

use tracing::{info, warn};

use crate::application::ports::outbound::{EntityStub, TownBlockStub};
use crate::application::services::DataStore;
use crate::application::universe::Handle;
use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, TownBlock, World};
use crate::domain::value_objects::PersistState;

/// Outcome of a bulk save sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub failed: usize,
}

impl SaveSummary {
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

impl DataStore {
    /// Flush the entire graph: list indices first, then every live record.
    /// Per-entity failures are logged and counted, never propagated - one
    /// bad record must not stop the rest of the sweep.
    pub async fn save_all(&self) -> SaveSummary {
        let _guard = self.structural.lock().await;
        info!("Saving world graph");
        let mut summary = SaveSummary::default();

        self.save_indices(&mut summary).await;

        for handle in self.universe.worlds() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_world(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(world = %record.name, "Could not save world: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.residents() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_resident(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(resident = %record.name, "Could not save resident: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.towns() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_town(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(town = %record.name, "Could not save town: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.nations() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_nation(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(nation = %record.name, "Could not save nation: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.town_blocks() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_town_block(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(block = %record.coord, "Could not save town block: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.plot_groups() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            // Empty groups are garbage, not records; collect them here the
            // same way the loader discards them.
            if record.is_empty() {
                self.universe.unregister_plot_group(record.id);
                handle.write().expect("lock poisoned").persist = PersistState::Deleted;
                if let Err(err) = self.backend.delete_plot_group(record.id).await {
                    warn!(group = %record.name, "Could not delete empty plot group: {err}");
                }
                continue;
            }
            match self.backend.save_plot_group(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(group = %record.name, "Could not save plot group: {err}");
                    summary.failed += 1;
                }
            }
        }
        for handle in self.universe.jails() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_jail(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(jail = %record.name, "Could not save jail: {err}");
                    summary.failed += 1;
                }
            }
        }

        info!(
            saved = summary.saved,
            failed = summary.failed,
            "World graph saved"
        );
        summary
    }

    /// Flush only the work queues. Cheap enough to run on a much shorter
    /// interval than the full sweep.
    pub async fn save_queues(&self) -> SaveSummary {
        let _guard = self.structural.lock().await;
        let mut summary = SaveSummary::default();

        let regen = self.universe.regen_queue();
        match self.backend.save_regen_queue(&regen).await {
            Ok(()) => summary.saved += 1,
            Err(err) => {
                warn!("Could not save regen queue: {err}");
                summary.failed += 1;
            }
        }
        let snapshots = self.universe.snapshot_queue();
        match self.backend.save_snapshot_queue(&snapshots).await {
            Ok(()) => summary.saved += 1,
            Err(err) => {
                warn!("Could not save snapshot queue: {err}");
                summary.failed += 1;
            }
        }
        summary
    }

    /// Flush only the world records and their index.
    pub async fn save_all_worlds(&self) -> SaveSummary {
        let _guard = self.structural.lock().await;
        let mut summary = SaveSummary::default();

        self.save_world_index().await;
        for handle in self.universe.worlds() {
            let Some(record) = snapshot(&handle) else {
                continue;
            };
            match self.backend.save_world(&record).await {
                Ok(()) => mark_clean(&handle, &mut summary),
                Err(err) => {
                    warn!(world = %record.name, "Could not save world: {err}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn save_indices(&self, summary: &mut SaveSummary) {
        let results = [
            self.save_world_index().await,
            self.save_resident_index().await,
            self.save_town_index().await,
            self.save_nation_index().await,
            self.save_town_block_index().await,
            self.save_plot_group_index().await,
            self.save_jail_index().await,
        ];
        for ok in results {
            if ok {
                summary.saved += 1;
            } else {
                summary.failed += 1;
            }
        }
    }

    // --- index flushes, shared with the mutation operations ---

    pub(super) async fn save_world_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.worlds(), |w: &World| {
            EntityStub::new(w.id, w.name.clone())
        });
        log_index_result("world", self.backend.save_world_list(&stubs).await)
    }

    pub(super) async fn save_town_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.towns(), |t: &Town| {
            EntityStub::new(t.id, t.name.clone())
        });
        log_index_result("town", self.backend.save_town_list(&stubs).await)
    }

    pub(super) async fn save_nation_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.nations(), |n: &Nation| {
            EntityStub::new(n.id, n.name.clone())
        });
        log_index_result("nation", self.backend.save_nation_list(&stubs).await)
    }

    pub(super) async fn save_resident_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.residents(), |r: &Resident| {
            EntityStub::new(r.id, r.name.clone())
        });
        log_index_result("resident", self.backend.save_resident_list(&stubs).await)
    }

    pub(super) async fn save_town_block_index(&self) -> bool {
        let stubs: Vec<TownBlockStub> = self
            .universe
            .town_blocks()
            .iter()
            .map(|handle| {
                let block = handle.read().expect("lock poisoned");
                TownBlockStub {
                    id: block.id,
                    coord: block.coord,
                }
            })
            .collect();
        log_index_result(
            "town block",
            self.backend.save_town_block_list(&stubs).await,
        )
    }

    pub(super) async fn save_plot_group_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.plot_groups(), |g: &PlotGroup| {
            EntityStub::new(g.id, g.name.clone())
        });
        log_index_result("plot group", self.backend.save_plot_group_list(&stubs).await)
    }

    pub(super) async fn save_jail_index(&self) -> bool {
        let stubs = stubs_of(&self.universe.jails(), |j: &Jail| {
            EntityStub::new(j.id, j.name.clone())
        });
        log_index_result("jail", self.backend.save_jail_list(&stubs).await)
    }

    // --- single-entity flushes, shared with the mutation operations ---
    //
    // Persistence failures after a committed in-memory edit are logged and
    // leave the entity dirty for the next bulk sweep; the edit itself is
    // never rolled back.

    pub(super) async fn persist_world(&self, handle: &Handle<World>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_world(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(world = %record.name, "Could not save world: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_town(&self, handle: &Handle<Town>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_town(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(town = %record.name, "Could not save town: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_nation(&self, handle: &Handle<Nation>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_nation(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(nation = %record.name, "Could not save nation: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_resident(&self, handle: &Handle<Resident>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_resident(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(resident = %record.name, "Could not save resident: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_town_block(&self, handle: &Handle<TownBlock>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_town_block(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(block = %record.coord, "Could not save town block: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_plot_group(&self, handle: &Handle<PlotGroup>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_plot_group(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(group = %record.name, "Could not save plot group: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }

    pub(super) async fn persist_jail(&self, handle: &Handle<Jail>) {
        let Some(record) = snapshot(handle) else {
            return;
        };
        match self.backend.save_jail(&record).await {
            Ok(()) => set_state(handle, PersistState::Clean),
            Err(err) => {
                warn!(jail = %record.name, "Could not save jail: {err}");
                set_state(handle, PersistState::Dirty);
            }
        }
    }
}

/// Copy an entity under its lock, skipping entities already torn down.
fn snapshot<T: Clone>(handle: &Handle<T>) -> Option<T>
where
    T: HasPersist,
{
    let entity = handle.read().expect("lock poisoned");
    if entity.persist_state().is_deleted() {
        return None;
    }
    Some(entity.clone())
}

fn mark_clean<T: HasPersist>(handle: &Handle<T>, summary: &mut SaveSummary) {
    set_state(handle, PersistState::Clean);
    summary.saved += 1;
}

fn set_state<T: HasPersist>(handle: &Handle<T>, state: PersistState) {
    let mut entity = handle.write().expect("lock poisoned");
    // A delete that raced the flush wins.
    if !entity.persist_state().is_deleted() {
        *entity.persist_state_mut() = state;
    }
}

fn stubs_of<T, F>(handles: &[Handle<T>], to_stub: F) -> Vec<EntityStub>
where
    F: Fn(&T) -> EntityStub,
{
    handles
        .iter()
        .map(|handle| to_stub(&*handle.read().expect("lock poisoned")))
        .collect()
}

fn log_index_result(kind: &str, result: Result<(), crate::StorageError>) -> bool {
    if let Err(err) = result {
        warn!("Could not save {kind} list: {err}");
        false
    } else {
        true
    }
}

/// Access to the persistence lifecycle marker every entity carries.
trait HasPersist {
    fn persist_state(&self) -> PersistState;
    fn persist_state_mut(&mut self) -> &mut PersistState;
}

macro_rules! impl_has_persist {
    ($($entity:ty),+ $(,)?) => {
        $(impl HasPersist for $entity {
            fn persist_state(&self) -> PersistState {
                self.persist
            }

            fn persist_state_mut(&mut self) -> &mut PersistState {
                &mut self.persist
            }
        })+
    };
}

impl_has_persist!(World, Town, Nation, Resident, TownBlock, Jail, PlotGroup);
