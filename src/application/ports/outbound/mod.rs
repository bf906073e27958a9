//! Outbound ports - Capabilities the application requires from adapters

mod data_source_port;
mod presence_port;

pub use data_source_port::{DataSourcePort, EntityStub, StorageError, TownBlockStub};
pub use presence_port::{NoPresence, PresencePort};
