//! Abstract traits for dependency inversion.
//!
//! The cache core never touches the network, the file system or a media
//! element directly. It talks to a `ResourceLoader` that produces
//! `MediaHandle`s, and the playback layer supplies both.
//!
//! Implementations live in `entities::loader` (file backend) and in tests.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::LoadError;
use super::key::ResourceKey;

/// How much media a handle can play without stalling.
///
/// Mirrors the media element ready-state ladder; the order matters,
/// comparisons use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    /// Enough data to play through most content
    HaveFutureData,
    HaveEnoughData,
}

/// Half-open span of buffered media time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whole-resource range, for handles that hold the full payload.
    pub fn everything() -> Self {
        Self { start: 0.0, end: f64::INFINITY }
    }

    /// True if `[from, from + secs]` lies inside this range.
    pub fn covers(&self, from: f64, secs: f64) -> bool {
        self.start <= from && self.end >= from + secs
    }
}

/// Playable object produced by a loader.
///
/// Handles are shared (`Arc`) between the cache and the playback layer.
/// `release()` is called once when the cache evicts or clears the entry;
/// the playback layer may still hold a clone, so implementations must stay
/// memory-safe after release (typically: drop buffers, report nothing buffered).
pub trait MediaHandle: Send + Sync + Debug {
    /// Buffered spans of media time.
    fn buffered(&self) -> Vec<TimeRange>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64 {
        0.0
    }

    /// Self-reported playability.
    fn ready_state(&self) -> ReadyState;

    /// Approximate resident size in bytes, if known.
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Detach the handle from its underlying resource.
    fn release(&self) {}
}

/// Blocking resource loader.
///
/// Called on a worker thread, never while the cache lock is held.
/// One call per admitted load; the cache guarantees no two concurrent
/// calls for the same key.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, key: &ResourceKey) -> Result<Arc<dyn MediaHandle>, LoadError>;
}

/// Blanket impl: Arc<T> implements the loader if T does
impl<T: ResourceLoader + ?Sized> ResourceLoader for Arc<T> {
    fn load(&self, key: &ResourceKey) -> Result<Arc<dyn MediaHandle>, LoadError> {
        (**self).load(key)
    }
}
