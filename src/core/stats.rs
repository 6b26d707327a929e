//! Cache counters and point-in-time reports.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Request counters, updated lock-free from any thread
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    loads_started: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Request attached to a load already queued or running
    pub fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn joins(&self) -> u64 {
        self.joins.load(Ordering::Relaxed)
    }

    pub fn loads_started(&self) -> u64 {
        self.loads_started.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hits over hits + misses; joins are neither.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// Point-in-time view of the cache, cheap to serialize for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSnapshot {
    /// Ready entries with a usable handle
    pub cached: usize,
    /// Ready entries whose load failed
    pub failed: usize,
    pub loading: usize,
    pub queued: usize,
    /// All live entries
    pub total: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub max_concurrent_loads: usize,
    pub max_cache_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    /// Sum of handle size hints (approximate)
    pub total_size_bytes: u64,
}

/// How much of a catalog is warm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCoverage {
    pub total: usize,
    pub cached: usize,
    /// Rounded percentage, 0 for an empty catalog
    pub percent: u32,
}

impl CatalogCoverage {
    pub fn new(total: usize, cached: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((cached as f64 / total as f64) * 100.0).round() as u32
        };
        Self { total, cached, percent }
    }
}
