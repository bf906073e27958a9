//! Demesne - Persistent town/nation world graph
//!
//! The crate manages a mutually-referential domain graph for a multiplayer
//! world-management service:
//! - Worlds own claimed coordinate cells (town blocks)
//! - Towns own blocks and residents, Nations federate towns
//! - Jails and plot groups group blocks inside a town
//!
//! The graph lives in an explicitly constructed [`Universe`] and is persisted
//! through a pluggable [`DataSourcePort`] (flat-file, SQLite, in-memory).
//! All structural edits go through [`DataStore`], which keeps the registry,
//! the graph and the backing store consistent with each other.
//!
//! [`Universe`]: application::Universe
//! [`DataSourcePort`]: application::ports::outbound::DataSourcePort
//! [`DataStore`]: application::services::DataStore

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::ports::outbound::{
    DataSourcePort, EntityStub, PresencePort, StorageError, TownBlockStub,
};
pub use application::services::{
    DataStore, LoadError, LoadFailure, LoadPhase, OpError, QueryService, SaveSummary,
    TownBlockStatus,
};
pub use application::{Handle, Universe};
pub use domain::error::{EntityKind, GraphError};
pub use infrastructure::config::{AppConfig, BackendKind};
pub use infrastructure::persistence::{FlatFileDataSource, InMemoryDataSource, SqliteDataSource};
pub use infrastructure::state::AppState;
