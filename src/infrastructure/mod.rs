//! Infrastructure layer - configuration, storage adapters, runtime wiring

pub mod config;
pub mod persistence;
pub mod state;
pub mod tasks;
