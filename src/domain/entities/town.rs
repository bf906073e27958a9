//! Town entity - an ownership group of residents and town blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    NationId, PersistState, Position, ResidentId, TownBlockId, TownId,
};

/// A town: owns a set of town blocks and a roster of residents, and may be
/// a member of one nation.
///
/// The spawn position only exists once a home block does; clearing the home
/// block clears the spawn with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub id: TownId,
    pub name: String,
    pub residents: Vec<ResidentId>,
    pub town_blocks: Vec<TownBlockId>,
    pub home_block: Option<TownBlockId>,
    pub spawn: Option<Position>,
    pub nation: Option<NationId>,
    /// Opting out removes this town's capital from nation-zone computation.
    pub nation_zone_opt_out: bool,
    pub registered: DateTime<Utc>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl Town {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TownId::new(),
            name: name.into(),
            residents: Vec::new(),
            town_blocks: Vec::new(),
            home_block: None,
            spawn: None,
            nation: None,
            nation_zone_opt_out: false,
            registered: Utc::now(),
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: TownId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::new("")
        }
    }

    pub fn has_nation(&self) -> bool {
        self.nation.is_some()
    }

    pub fn has_resident(&self, id: ResidentId) -> bool {
        self.residents.contains(&id)
    }

    pub fn has_town_block(&self, id: TownBlockId) -> bool {
        self.town_blocks.contains(&id)
    }
}
