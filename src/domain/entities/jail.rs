//! Jail entity - a detention area tied to one town

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{JailId, PersistState, TownBlockId, TownId};

/// A jail: a named set of town blocks within one town designated as cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jail {
    pub id: JailId,
    pub name: String,
    pub town: TownId,
    pub cells: Vec<TownBlockId>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl Jail {
    pub fn new(name: impl Into<String>, town: TownId, cells: Vec<TownBlockId>) -> Self {
        Self {
            id: JailId::new(),
            name: name.into(),
            town,
            cells,
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: JailId, name: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(name, TownId::from_uuid(uuid::Uuid::nil()), Vec::new())
        }
    }
}
