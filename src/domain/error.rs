//! Graph-level error taxonomy
//!
//! Every rejected mutation maps to exactly one of these variants and leaves
//! the registry and the graph unchanged.

/// The seven kinds of registered entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    World,
    Town,
    Nation,
    Resident,
    TownBlock,
    Jail,
    PlotGroup,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::World => "world",
            EntityKind::Town => "town",
            EntityKind::Nation => "nation",
            EntityKind::Resident => "resident",
            EntityKind::TownBlock => "town block",
            EntityKind::Jail => "jail",
            EntityKind::PlotGroup => "plot group",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by registry lookups and mutation operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("{kind} '{name}' is not registered")]
    NotRegistered { kind: EntityKind, name: String },

    #[error("{kind} '{name}' is already registered")]
    AlreadyRegistered { kind: EntityKind, name: String },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("operation rejected: {0}")]
    InvariantViolation(String),
}

impl GraphError {
    pub fn not_registered(kind: EntityKind, name: impl Into<String>) -> Self {
        GraphError::NotRegistered {
            kind,
            name: name.into(),
        }
    }

    pub fn violation(reason: impl Into<String>) -> Self {
        GraphError::InvariantViolation(reason.into())
    }
}
