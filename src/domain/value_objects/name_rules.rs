//! Name validation - kind-specific rules checked before any registry lookup

use crate::domain::error::{EntityKind, GraphError};

/// Names that collide with command keywords and can never be entity names.
const RESERVED: &[&str] = &["new", "here", "list", "spawn"];

fn max_len(kind: EntityKind) -> usize {
    match kind {
        // Platform account names cap at 16 characters.
        EntityKind::Resident => 16,
        _ => 32,
    }
}

/// Validate a proposed name for the given entity kind.
///
/// Validity is checked before duplicate checks so that an invalid name is
/// always reported as invalid, never as a duplicate.
pub fn validate_name(kind: EntityKind, name: &str) -> Result<(), GraphError> {
    let invalid = |reason: &str| GraphError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > max_len(kind) {
        return Err(invalid("name is too long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("name contains forbidden characters"));
    }
    if matches!(kind, EntityKind::Town | EntityKind::Nation)
        && RESERVED.contains(&name.to_lowercase().as_str())
    {
        return Err(invalid("name is reserved"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_names() {
        assert!(validate_name(EntityKind::Town, "Alpha").is_ok());
        assert!(validate_name(EntityKind::Resident, "bob_42").is_ok());
        assert!(validate_name(EntityKind::PlotGroup, "market-row.north").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_overlong() {
        assert!(validate_name(EntityKind::Town, "").is_err());
        assert!(validate_name(EntityKind::Resident, &"x".repeat(17)).is_err());
        assert!(validate_name(EntityKind::Town, &"x".repeat(33)).is_err());
    }

    #[test]
    fn test_rejects_forbidden_characters() {
        assert!(validate_name(EntityKind::Town, "bad name").is_err());
        assert!(validate_name(EntityKind::Nation, "semi;colon").is_err());
    }

    #[test]
    fn test_reserved_words_only_bind_towns_and_nations() {
        assert!(validate_name(EntityKind::Town, "Spawn").is_err());
        assert!(validate_name(EntityKind::Nation, "new").is_err());
        assert!(validate_name(EntityKind::Resident, "spawn").is_ok());
    }
}
