//! Cache engine: resource cache, readiness, idle fill, prefetch, workers.
//!
//! Independent of any UI; the consuming layer talks to it through
//! `ResourceCache` and the events on its `EventBus`.

pub mod budget;
pub mod cache_events;
pub mod event_bus;
pub mod idle;
pub mod load_queue;
pub mod pending;
pub mod prefetch;
pub mod readiness;
pub mod resource_cache;
pub mod stats;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use budget::LoadBudget;
pub use cache_events::{CacheCleared, ResourceEvicted, ResourceFailed, ResourceReady};
pub use event_bus::{BoxedEvent, EventBus, downcast_event};
pub use idle::{IdlePreloadScheduler, IdleState};
pub use load_queue::LoadQueue;
pub use pending::Pending;
pub use prefetch::{Direction, PrefetchPlan, WindowedPrefetchPolicy, compute_window};
pub use readiness::{BufferReadinessMonitor, has_enough_buffer};
pub use resource_cache::ResourceCache;
pub use stats::{CacheSnapshot, CacheStats, CatalogCoverage};
pub use workers::Workers;
