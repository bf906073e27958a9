//! Spawn positions - an exact point within a world

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{BlockCoord, WorldId};

/// An exact location inside a world, used for town and nation spawns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// The block coordinate containing this position, assuming 16-unit cells.
    pub fn block_coord(&self) -> BlockCoord {
        BlockCoord::new(
            self.world,
            (self.x / 16.0).floor() as i32,
            (self.z / 16.0).floor() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_coord_floors_negative_positions() {
        let world = WorldId::new();
        let pos = Position::new(world, -0.5, 64.0, 17.0);
        let coord = pos.block_coord();
        assert_eq!((coord.x, coord.z), (-1, 1));
    }
}
