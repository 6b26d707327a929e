//! Ordered catalog of prefetchable resources plus the viewer's position.
//!
//! Owned by the consuming layer. The prefetch policy and the idle
//! scheduler only read it.

use serde::{Deserialize, Serialize};

use super::key::ResourceKey;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndex {
    keys: Vec<ResourceKey>,
    /// Current position, `None` if the viewer is not on any catalog item
    current: Option<usize>,
}

impl CatalogIndex {
    pub fn new(keys: Vec<ResourceKey>) -> Self {
        let current = if keys.is_empty() { None } else { Some(0) };
        Self { keys, current }
    }

    pub fn keys(&self) -> &[ResourceKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn current_key(&self) -> Option<&ResourceKey> {
        self.current.and_then(|idx| self.keys.get(idx))
    }

    pub fn key_at(&self, index: usize) -> Option<&ResourceKey> {
        self.keys.get(index)
    }

    /// First position of `key` in the catalog.
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.as_str() == key)
    }

    /// Move to `index`. Out-of-range indices clear the position.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.keys.len() {
            self.current = Some(index);
            true
        } else {
            self.current = None;
            false
        }
    }

    /// Move to the position of `key`; clears the position if absent.
    pub fn set_current_key(&mut self, key: &str) -> bool {
        self.current = self.position_of(key);
        self.current.is_some()
    }
}

impl FromIterator<ResourceKey> for CatalogIndex {
    fn from_iter<I: IntoIterator<Item = ResourceKey>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
