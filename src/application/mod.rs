//! Application layer - The in-memory graph and the contracts around it
//!
//! This layer contains:
//! - Registry: canonical name/id indices, one per entity kind
//! - Universe: the explicitly constructed context object holding the graph
//! - Ports: the persistence and presence capabilities the graph requires
//! - Services: the data store (load/save orchestration, mutations) and the
//!   derived lookup surface

pub mod ports;
pub mod registry;
pub mod services;
pub mod universe;

pub use universe::{Handle, Universe, UniverseCounts};
