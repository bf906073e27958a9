//! Identity registry - canonical name and id indices for one entity kind
//!
//! The registry is the single source of truth for existence and uniqueness.
//! Names are unique case-insensitively within a kind; ids are unique within
//! a kind for the lifetime of the process (a deleted entity's id is never
//! reused because ids are random v4 uuids).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{Jail, Nation, PlotGroup, Resident, Town, World};
use crate::domain::error::{EntityKind, GraphError};
use crate::domain::value_objects::{
    validate_name, JailId, NationId, PlotGroupId, ResidentId, TownId, WorldId,
};

/// An entity that can live in a [`KindRegistry`].
pub trait Registrable: Send + Sync {
    type Id: Copy + Eq + Hash + std::fmt::Display + Send + Sync;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

macro_rules! impl_registrable {
    ($entity:ty, $id:ty, $kind:expr) => {
        impl Registrable for $entity {
            type Id = $id;

            const KIND: EntityKind = $kind;

            fn id(&self) -> $id {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }
        }
    };
}

impl_registrable!(World, WorldId, EntityKind::World);
impl_registrable!(Town, TownId, EntityKind::Town);
impl_registrable!(Nation, NationId, EntityKind::Nation);
impl_registrable!(Resident, ResidentId, EntityKind::Resident);
impl_registrable!(Jail, JailId, EntityKind::Jail);
impl_registrable!(PlotGroup, PlotGroupId, EntityKind::PlotGroup);

/// Name/id indices for one entity kind.
///
/// Entities are handed out as `Arc<RwLock<T>>` so field access never needs
/// the registry; only structural operations (register, remove, rename) touch
/// the indices, and callers serialize those behind the universe lock.
pub struct KindRegistry<T: Registrable> {
    by_id: HashMap<T::Id, Arc<RwLock<T>>>,
    by_name: HashMap<String, T::Id>,
}

impl<T: Registrable> Default for KindRegistry<T> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T: Registrable> KindRegistry<T> {
    /// Register an entity, rejecting duplicate names (case-insensitive) and
    /// duplicate ids without touching either index.
    pub fn register(&mut self, entity: T) -> Result<Arc<RwLock<T>>, GraphError> {
        let key = entity.name().to_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(GraphError::AlreadyRegistered {
                kind: T::KIND,
                name: entity.name().to_string(),
            });
        }
        if self.by_id.contains_key(&entity.id()) {
            return Err(GraphError::AlreadyRegistered {
                kind: T::KIND,
                name: entity.id().to_string(),
            });
        }

        let id = entity.id();
        let handle = Arc::new(RwLock::new(entity));
        self.by_name.insert(key, id);
        self.by_id.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Remove an entity from both indices, returning its handle.
    pub fn remove(&mut self, id: T::Id) -> Option<Arc<RwLock<T>>> {
        let handle = self.by_id.remove(&id)?;
        let key = handle.read().expect("lock poisoned").name().to_lowercase();
        self.by_name.remove(&key);
        Some(handle)
    }

    /// Rename an entity. Validity is checked before duplicate checks, and
    /// the index and the entity's own name move in the same step - no
    /// intermediate state ever exposes two entries for one entity.
    pub fn rename(&mut self, id: T::Id, new_name: &str) -> Result<(), GraphError> {
        validate_name(T::KIND, new_name)?;

        let handle = self.by_id.get(&id).ok_or_else(|| GraphError::NotRegistered {
            kind: T::KIND,
            name: id.to_string(),
        })?;

        let old_key = handle.read().expect("lock poisoned").name().to_lowercase();
        let new_key = new_name.to_lowercase();
        if new_key != old_key && self.by_name.contains_key(&new_key) {
            return Err(GraphError::AlreadyRegistered {
                kind: T::KIND,
                name: new_name.to_string(),
            });
        }

        handle
            .write()
            .expect("lock poisoned")
            .set_name(new_name.to_string());
        self.by_name.remove(&old_key);
        self.by_name.insert(new_key, id);
        Ok(())
    }

    pub fn get(&self, id: T::Id) -> Option<Arc<RwLock<T>>> {
        self.by_id.get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<RwLock<T>>> {
        let id = self.by_name.get(&name.to_lowercase())?;
        self.by_id.get(id).cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    pub fn all(&self) -> Vec<Arc<RwLock<T>>> {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_case_insensitive_duplicate() {
        let mut registry = KindRegistry::<Town>::default();
        registry.register(Town::new("Alpha")).unwrap();

        let err = registry.register(Town::new("ALPHA")).unwrap_err();
        assert!(matches!(err, GraphError::AlreadyRegistered { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_name_is_case_insensitive() {
        let mut registry = KindRegistry::<Town>::default();
        let handle = registry.register(Town::new("Alpha")).unwrap();

        let found = registry.get_by_name("aLpHa").unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
    }

    #[test]
    fn test_rename_checks_validity_before_duplicates() {
        let mut registry = KindRegistry::<Town>::default();
        let town = Town::new("Alpha");
        let id = town.id;
        registry.register(town).unwrap();

        // An invalid name is reported as invalid even though it cannot
        // collide with anything.
        let err = registry.rename(id, "bad name!").unwrap_err();
        assert!(matches!(err, GraphError::InvalidName { .. }));
    }

    #[test]
    fn test_rename_swaps_index_atomically() {
        let mut registry = KindRegistry::<Town>::default();
        let town = Town::new("Alpha");
        let id = town.id;
        registry.register(town).unwrap();

        registry.rename(id, "Beta").unwrap();
        assert!(registry.get_by_name("alpha").is_none());
        let renamed = registry.get_by_name("beta").unwrap();
        assert_eq!(renamed.read().unwrap().id, id);
        assert_eq!(renamed.read().unwrap().name, "Beta");
    }

    #[test]
    fn test_rename_to_own_name_changes_casing() {
        let mut registry = KindRegistry::<Town>::default();
        let town = Town::new("alpha");
        let id = town.id;
        registry.register(town).unwrap();

        registry.rename(id, "Alpha").unwrap();
        assert_eq!(registry.get_by_name("alpha").unwrap().read().unwrap().name, "Alpha");
    }

    #[test]
    fn test_removed_name_is_immediately_reusable() {
        let mut registry = KindRegistry::<Town>::default();
        let town = Town::new("Alpha");
        let id = town.id;
        registry.register(town).unwrap();
        registry.remove(id).unwrap();

        assert!(registry.register(Town::new("Alpha")).is_ok());
    }
}
