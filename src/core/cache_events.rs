//! Events published by `ResourceCache` on its `EventBus`.

use crate::entities::{LoadError, ResourceKey};

/// A load finished and the handle is usable
#[derive(Clone, Debug)]
pub struct ResourceReady {
    pub key: ResourceKey,
}

/// A load failed; the entry is terminal with no handle
#[derive(Clone, Debug)]
pub struct ResourceFailed {
    pub key: ResourceKey,
    pub error: LoadError,
}

/// The eviction policy dropped a ready entry
#[derive(Clone, Debug)]
pub struct ResourceEvicted {
    pub key: ResourceKey,
}

/// `ResourceCache::clear()` ran (navigation invalidation)
#[derive(Clone, Debug)]
pub struct CacheCleared {
    /// Ready + queued entries dropped
    pub dropped: usize,
}
