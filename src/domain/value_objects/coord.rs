//! Block coordinates - the key of a claimed cell within a world

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::WorldId;

/// The grid coordinate of a single town block within one world.
///
/// Two blocks in different worlds never compare equal even at the same
/// (x, z); the world id is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockCoord {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl BlockCoord {
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Chebyshev distance to another coordinate in the same world.
    ///
    /// Returns `None` when the coordinates live in different worlds.
    pub fn distance(&self, other: &BlockCoord) -> Option<u32> {
        if self.world != other.world {
            return None;
        }
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        Some(dx.max(dz))
    }
}

impl std::fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{},{}", self.world, self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_chebyshev() {
        let world = WorldId::new();
        let a = BlockCoord::new(world, 0, 0);
        let b = BlockCoord::new(world, 3, -2);
        assert_eq!(a.distance(&b), Some(3));
    }

    #[test]
    fn test_distance_across_worlds_is_none() {
        let a = BlockCoord::new(WorldId::new(), 0, 0);
        let b = BlockCoord::new(WorldId::new(), 0, 0);
        assert_eq!(a.distance(&b), None);
    }
}
