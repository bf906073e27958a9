//! Resident entity - an individual actor, player-backed or NPC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{PersistState, ResidentId, TownId};

/// A resident: belongs to at most one town.
///
/// `player` links the resident to a stable platform account when one exists;
/// NPCs have none. Residents absent past the retention threshold can be
/// hibernated - persisted but dropped from the active registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub name: String,
    pub player: Option<Uuid>,
    pub town: Option<TownId>,
    pub npc: bool,
    pub registered: DateTime<Utc>,
    pub last_online: DateTime<Utc>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl Resident {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ResidentId::new(),
            name: name.into(),
            player: None,
            town: None,
            npc: false,
            registered: now,
            last_online: now,
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: ResidentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::new("")
        }
    }

    pub fn with_player(mut self, player: Uuid) -> Self {
        self.player = Some(player);
        self
    }

    pub fn as_npc(mut self) -> Self {
        self.npc = true;
        self
    }

    pub fn has_town(&self) -> bool {
        self.town.is_some()
    }

    /// Whether the resident has been offline longer than `retention`.
    pub fn absent_past(&self, retention: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_online > retention
    }
}
