//! reelcache - preload cache for streamable media
//!
//! Keeps the resources around the viewer's position warm so switching
//! between them shows no load delay.

// Cache engine (cache, readiness, idle fill, prefetch, workers)
pub mod core;

// Data types and loader backends
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod paths;

pub use config::CacheConfig;
pub use core::{
    BufferReadinessMonitor, CacheSnapshot, Direction, EventBus, IdlePreloadScheduler, Pending,
    ResourceCache, WindowedPrefetchPolicy,
};
pub use entities::{
    CacheError, CatalogIndex, EntryStatus, FileLoader, LoadError, MediaHandle, Priority,
    ResourceEntry, ResourceKey, ResourceLoader,
};
