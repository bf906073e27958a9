//! Domain layer - Core graph objects with no external dependencies
//!
//! This layer contains:
//! - Entities: World, Town, Nation, Resident, TownBlock, Jail, PlotGroup
//! - Value Objects: typed ids, coordinates, positions, name rules
//! - Errors: the graph-level error taxonomy

pub mod entities;
pub mod error;
pub mod value_objects;
