//! Per-resource state as seen by cache callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::LoadError;
use super::key::ResourceKey;
use super::traits::MediaHandle;

/// Resource lifecycle status
///
/// `Unrequested -> Queued -> Loading -> Ready`, and `Ready -> Evicted`
/// when the eviction policy (or an invalidation) drops the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Unrequested,
    Queued,
    Loading,
    Ready,
    Evicted,
}

impl EntryStatus {
    /// Queued or loading: the key already has a load on its way.
    pub fn is_pending(self) -> bool {
        matches!(self, EntryStatus::Queued | EntryStatus::Loading)
    }

    /// Known to the cache in any live state.
    pub fn is_tracked(self) -> bool {
        matches!(self, EntryStatus::Queued | EntryStatus::Loading | EntryStatus::Ready)
    }
}

/// Load priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Explicit user intent, dequeued first
    High,
    #[default]
    Normal,
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub key: ResourceKey,
    pub status: EntryStatus,
    /// Present once the load succeeded; `None` for failed loads.
    pub handle: Option<Arc<dyn MediaHandle>>,
    /// Monotonic access tick (higher = more recent).
    pub last_accessed: u64,
    /// Terminal load failure, if any.
    pub error: Option<LoadError>,
}

impl ResourceEntry {
    pub fn new(key: ResourceKey, status: EntryStatus, last_accessed: u64) -> Self {
        Self {
            key,
            status,
            handle: None,
            last_accessed,
            error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == EntryStatus::Ready
    }

    /// Terminal `Ready` state reached through a failed load.
    pub fn is_failed(&self) -> bool {
        self.status == EntryStatus::Ready && self.handle.is_none()
    }
}
