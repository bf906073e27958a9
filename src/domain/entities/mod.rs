//! Domain entities - Graph objects with identity
//!
//! Back-references between entities are stored as typed ids on both sides
//! (Town.residents / Resident.town, Nation.towns / Town.nation, ...), never
//! as object pointers. Mutation operations update both sides together;
//! invariant checks reduce to pure functions over the registry state.

mod jail;
mod nation;
mod plot_group;
mod resident;
mod town;
mod town_block;
mod world;

pub use jail::Jail;
pub use nation::Nation;
pub use plot_group::PlotGroup;
pub use resident::Resident;
pub use town::Town;
pub use town_block::TownBlock;
pub use world::World;
