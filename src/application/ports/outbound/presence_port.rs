//! Presence port - Resolves which platform accounts are currently connected
//!
//! Presence lives entirely outside this crate (session/transport layer);
//! the lookup surface only needs a membership predicate.

use uuid::Uuid;

pub trait PresencePort: Send + Sync {
    fn is_online(&self, player: Uuid) -> bool;
}

/// Presence stub that reports everyone offline. Useful for tools and tests
/// that only care about the persisted graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresence;

impl PresencePort for NoPresence {
    fn is_online(&self, _player: Uuid) -> bool {
        false
    }
}
