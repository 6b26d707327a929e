//! Windowed prefetch around the viewer's catalog position.
//!
//! The window wraps around both ends of the catalog: with `N` keys and
//! position `i`, ahead keys are `(i + k) mod N`, behind keys
//! `(i - k + N) mod N`. The immediate neighbour in the direction of travel
//! goes out at `High`, the rest of the window at `Normal`.

use std::hash::Hash;

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use super::resource_cache::ResourceCache;
use crate::config::CacheConfig;
use crate::entities::{CatalogIndex, Priority, ResourceKey};

/// Direction of travel through the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Index `steps` positions away from `from`, wrapping in a catalog of `len`.
    fn step(self, from: usize, steps: usize, len: usize) -> usize {
        let steps = steps % len;
        match self {
            Direction::Forward => (from + steps) % len,
            Direction::Backward => (from + len - steps) % len,
        }
    }
}

/// Keys to prefetch around `current`: `ahead` following keys, then
/// `behind` preceding ones, wrapping at both ends.
///
/// Insertion-ordered and duplicate-free. When the window is as large as the
/// catalog it wraps onto `current` itself. Empty for an empty catalog or an
/// out-of-range `current`.
pub fn compute_window<K>(catalog: &[K], current: usize, ahead: usize, behind: usize) -> IndexSet<K>
where
    K: Clone + Hash + Eq,
{
    let len = catalog.len();
    let mut window = IndexSet::new();
    if current >= len {
        return window;
    }

    // Only `len` distinct positions exist in either direction
    let forward = (1..=ahead.min(len)).map(|k| Direction::Forward.step(current, k, len));
    let backward = (1..=behind.min(len)).map(|k| Direction::Backward.step(current, k, len));
    for idx in forward.chain(backward) {
        window.insert(catalog[idx].clone());
    }
    window
}

/// What one `prefetch` call asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefetchPlan {
    /// Requested at `High`
    pub neighbour: Option<ResourceKey>,
    pub window: IndexSet<ResourceKey>,
    /// Keys actually submitted (not already tracked)
    pub submitted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedPrefetchPolicy {
    pub ahead: usize,
    pub behind: usize,
}

impl WindowedPrefetchPolicy {
    pub fn new(ahead: usize, behind: usize) -> Self {
        Self { ahead, behind }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.preload_ahead, config.preload_behind)
    }

    pub fn window(&self, catalog: &CatalogIndex) -> IndexSet<ResourceKey> {
        match catalog.current() {
            Some(current) => compute_window(catalog.keys(), current, self.ahead, self.behind),
            None => IndexSet::new(),
        }
    }

    /// Warm the neighbourhood of the current position.
    pub fn prefetch(&self, cache: &ResourceCache, catalog: &CatalogIndex, direction: Direction) -> PrefetchPlan {
        let Some(current) = catalog.current() else {
            return PrefetchPlan::default();
        };

        let neighbour = catalog
            .key_at(direction.step(current, 1, catalog.len()))
            .cloned();
        let window = self.window(catalog);

        let mut submitted = 0;
        if let Some(key) = &neighbour {
            submitted += cache.preload_many([key.clone()], Priority::High);
        }
        submitted += cache.preload_many(window.iter().cloned(), Priority::Normal);

        debug!(
            "Prefetch around {} ({:?}): window {}, submitted {}",
            current,
            direction,
            window.len(),
            submitted
        );
        PrefetchPlan {
            neighbour,
            window,
            submitted,
        }
    }

    /// Hover on a previous/next control: warm `count` keys that way at `Normal`.
    pub fn prefetch_toward(
        &self,
        cache: &ResourceCache,
        catalog: &CatalogIndex,
        direction: Direction,
        count: usize,
    ) -> usize {
        let Some(current) = catalog.current() else {
            return 0;
        };
        let len = catalog.len();
        let keys: IndexSet<ResourceKey> = (1..=count.min(len))
            .filter_map(|k| catalog.key_at(direction.step(current, k, len)).cloned())
            .collect();
        cache.preload_many(keys, Priority::Normal)
    }
}
