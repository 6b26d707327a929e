//! Buffer readiness check, run before the playback layer commits to a resource.
//!
//! A resource is "ready" when a buffered range covers
//! `[current_time, current_time + min_buffer_secs]`, or when the handle
//! reports `HaveFutureData` or better. Timeout is a normal outcome
//! (`false`), never an error.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use super::pending::Pending;
use super::resource_cache::ResourceCache;
use crate::entities::{MediaHandle, Priority, ReadyState, ResourceEntry, ResourceKey};

/// True if `handle` can play `min_secs` from its current position without stalling.
pub fn has_enough_buffer(handle: &dyn MediaHandle, min_secs: f64) -> bool {
    if handle.ready_state() >= ReadyState::HaveFutureData {
        return true;
    }
    let now = handle.current_time();
    handle.buffered().iter().any(|range| range.covers(now, min_secs))
}

#[derive(Debug, Clone)]
pub struct BufferReadinessMonitor {
    cache: ResourceCache,
    interval: Duration,
}

impl BufferReadinessMonitor {
    /// Poll period taken from the cache config.
    pub fn new(cache: ResourceCache) -> Self {
        let interval = cache.config().buffer_check_interval();
        Self { cache, interval }
    }

    /// Resolve `true` once `key` has `min_buffer_secs` buffered, `false` after `timeout`.
    ///
    /// Requests the key at `High` priority if it is not cached. The timeout
    /// covers the load wait as well as the buffer poll. A failed load
    /// resolves `false` without waiting. A timeout too large for the clock
    /// (`Duration::MAX`) means no deadline.
    pub fn ensure_ready(&self, key: ResourceKey, min_buffer_secs: f64, timeout: Duration) -> Pending<bool> {
        let deadline = Instant::now().checked_add(timeout);
        let load = self.cache.request(key.clone(), Priority::High);

        // Cache hit: answer inline when possible
        if let Some(entry) = load.try_get() {
            match &entry.handle {
                None => return Pending::resolved(false),
                Some(handle) if has_enough_buffer(handle.as_ref(), min_buffer_secs) => {
                    return Pending::resolved(true);
                }
                Some(_) => {}
            }
        }

        let result = Pending::new();
        let out = result.clone();
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("reelcache-readiness".into())
            .spawn(move || {
                let ready = wait_for_buffer(&load, min_buffer_secs, deadline, interval);
                debug!("Readiness {}: {}", key, ready);
                out.resolve(ready);
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn readiness thread: {}", e);
            result.resolve(false);
        }
        result
    }

    /// `ensure_ready` with `min_buffer_seconds` and `buffer_timeout` from the config.
    pub fn ensure_ready_default(&self, key: ResourceKey) -> Pending<bool> {
        let config = self.cache.config();
        let (min, timeout) = (config.min_buffer_seconds, config.buffer_timeout());
        self.ensure_ready(key, min, timeout)
    }
}

fn wait_for_buffer(
    load: &Pending<ResourceEntry>,
    min_secs: f64,
    deadline: Option<Instant>,
    interval: Duration,
) -> bool {
    let remaining = deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()));
    let Some(entry) = load.wait_timeout(remaining) else {
        trace!("Readiness: load did not finish before deadline");
        return false;
    };
    let Some(handle) = entry.handle else {
        return false;
    };

    loop {
        if has_enough_buffer(handle.as_ref(), min_secs) {
            return true;
        }
        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                interval.min(deadline - now)
            }
            None => interval,
        };
        thread::sleep(pause);
    }
}
