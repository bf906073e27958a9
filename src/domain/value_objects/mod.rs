//! Value objects - Immutable objects defined by their attributes

mod coord;
mod ids;
mod name_rules;
mod persist_state;
mod position;

pub use coord::BlockCoord;
pub use ids::*;
pub use name_rules::validate_name;
pub use persist_state::PersistState;
pub use position::Position;
