//! Registries of active artifacts.
//!
//! Readers take a snapshot of the list and never wait on deployments.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RegistryError;

/// Items that can be stored in a registry.
pub trait Registerable: Send + Sync {
    /// Unique identifier within one registry.
    fn registry_id(&self) -> &str;
}

/// Ordered registry of shared items keyed by their id.
pub struct ArtifactRegistry<T: ?Sized + Registerable> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized + Registerable> ArtifactRegistry<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Register an item. Fails if its id is taken.
    pub fn register(&self, item: Arc<T>) -> Result<(), RegistryError> {
        let mut items = self.items.write();
        if items.iter().any(|existing| existing.registry_id() == item.registry_id()) {
            return Err(RegistryError::AlreadyRegistered(item.registry_id().to_string()));
        }
        items.push(item);
        Ok(())
    }

    /// Remove and return the item with the given id.
    pub fn unregister(&self, id: &str) -> Result<Arc<T>, RegistryError> {
        let mut items = self.items.write();
        let index = items
            .iter()
            .position(|item| item.registry_id() == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.items
            .read()
            .iter()
            .find(|item| item.registry_id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Copy of the current list, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.items
            .read()
            .iter()
            .map(|item| item.registry_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T: ?Sized + Registerable> Default for ArtifactRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
