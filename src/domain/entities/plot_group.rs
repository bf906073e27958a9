//! PlotGroup entity - a set of town blocks sharing group-level attributes

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{PersistState, PlotGroupId, TownBlockId, TownId};

/// A plot group: blocks within one town sold and managed as a unit.
///
/// A group whose block set becomes empty is removed from the registry
/// automatically; an empty group is never observable through lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotGroup {
    pub id: PlotGroupId,
    pub name: String,
    pub town: TownId,
    pub blocks: Vec<TownBlockId>,
    pub price: f64,
    #[serde(skip)]
    pub persist: PersistState,
}

impl PlotGroup {
    pub fn new(name: impl Into<String>, town: TownId) -> Self {
        Self {
            id: PlotGroupId::new(),
            name: name.into(),
            town,
            blocks: Vec::new(),
            price: 0.0,
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: PlotGroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(name, TownId::from_uuid(uuid::Uuid::nil()))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
