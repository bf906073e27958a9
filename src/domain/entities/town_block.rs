//! TownBlock entity - a single claimable coordinate cell

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    BlockCoord, PersistState, PlotGroupId, ResidentId, TownBlockId, TownId,
};

/// One coordinate cell within a world.
///
/// A block with no town is wilderness. If the block has a resident owner,
/// that resident must be a member of the owning town; both fields are only
/// ever written together by a mutation operation so a concurrent value-copy
/// save never observes the pair half-updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TownBlock {
    pub id: TownBlockId,
    pub coord: BlockCoord,
    pub town: Option<TownId>,
    pub resident: Option<ResidentId>,
    pub plot_group: Option<PlotGroupId>,
    pub price: Option<f64>,
    #[serde(skip)]
    pub persist: PersistState,
}

impl TownBlock {
    pub fn new(coord: BlockCoord) -> Self {
        Self {
            id: TownBlockId::new(),
            coord,
            town: None,
            resident: None,
            plot_group: None,
            price: None,
            persist: PersistState::Transient,
        }
    }

    pub fn shell(id: TownBlockId, coord: BlockCoord) -> Self {
        Self {
            id,
            ..Self::new(coord)
        }
    }

    /// The derived, human-readable name of this block.
    pub fn display_name(&self) -> String {
        self.coord.to_string()
    }

    pub fn has_town(&self) -> bool {
        self.town.is_some()
    }

    pub fn has_resident(&self) -> bool {
        self.resident.is_some()
    }

    pub fn is_wilderness(&self) -> bool {
        self.town.is_none()
    }
}
