//! World entity - a named geographic namespace for claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{PersistState, WorldId};

/// A world: the namespace every town block coordinate lives in.
///
/// `claims_enabled` gates whether claims mean anything here; in a world with
/// claims disabled every coordinate classifies as unclaimable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub claims_enabled: bool,
    pub registered: DateTime<Utc>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorldId::new(),
            name: name.into(),
            claims_enabled: true,
            registered: Utc::now(),
            persist: PersistState::Transient,
        }
    }

    /// An empty shell carrying only identity, pending a full-field load.
    pub fn shell(id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::new("")
        }
    }

    pub fn with_claims_enabled(mut self, enabled: bool) -> Self {
        self.claims_enabled = enabled;
        self
    }
}
