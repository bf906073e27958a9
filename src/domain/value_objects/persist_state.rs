//! Per-entity persistence lifecycle state

use serde::{Deserialize, Serialize};

/// Where an entity stands relative to the backing store.
///
/// `Transient` entities were created in memory and are not durable yet.
/// `Deleted` is terminal; mutation operations reject deleted entities.
/// The state is bookkeeping only and is never serialized - a freshly
/// deserialized entity is `Clean` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersistState {
    Transient,
    #[default]
    Clean,
    Dirty,
    Deleted,
}

impl PersistState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, PersistState::Deleted)
    }
}
