//! Application services - orchestration over the universe and the backend
//!
//! [`DataStore`] is the write path: every structural edit of the graph and
//! every bulk load/save sweep goes through it. [`QueryService`] is the
//! read-only derived lookup surface.

mod data_store;
mod load;
mod merge;
mod mutations;
mod query_service;
mod save;

pub use data_store::DataStore;
pub use load::{LoadError, LoadFailure, LoadPhase};
pub use mutations::OpError;
pub use query_service::{QueryService, TownBlockStatus};
pub use save::SaveSummary;
