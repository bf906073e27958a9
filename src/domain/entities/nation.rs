//! Nation entity - a federation of towns with one capital

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{NationId, PersistState, TownId};

/// A nation: one or more member towns, exactly one of which is the capital.
///
/// A nation with zero towns does not exist - the last town leaving triggers
/// nation deletion. The ally relation is symmetric and both sides are
/// updated in the same mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nation {
    pub id: NationId,
    pub name: String,
    pub towns: Vec<TownId>,
    pub capital: TownId,
    pub allies: Vec<NationId>,
    pub registered: DateTime<Utc>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl Nation {
    pub fn new(name: impl Into<String>, capital: TownId) -> Self {
        Self {
            id: NationId::new(),
            name: name.into(),
            towns: vec![capital],
            capital,
            allies: Vec::new(),
            registered: Utc::now(),
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: NationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            // Placeholder until the full record resolves the real capital.
            ..Self::new("", TownId::from_uuid(uuid::Uuid::nil()))
        }
    }

    pub fn has_town(&self, id: TownId) -> bool {
        self.towns.contains(&id)
    }

    pub fn is_capital(&self, id: TownId) -> bool {
        self.capital == id
    }

    pub fn is_allied_with(&self, other: NationId) -> bool {
        self.allies.contains(&other)
    }
}
