//! Resource cache with request dedup, bounded concurrent loading,
//! two-tier priority queueing and LRU eviction.
//!
//! Structure:
//! - `entries`: key -> slot, one slot per live key (Queued, Loading or Ready)
//! - `ready_order`: LRU order over Ready keys only, so queued/in-flight
//!   entries can never be picked for eviction
//! - `queue` + `budget`: admission control, at most `max_concurrent_loads`
//!   loads in flight
//!
//! All of it sits behind one mutex. Loader calls, handle release, waiter
//! wake-ups and event callbacks run outside the lock.
//!
//! Load failures are absorbed: the entry turns terminal (Ready, no handle),
//! the slot is released, waiters resolve, the queue keeps draining.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, trace, warn};
use lru::LruCache;

use super::budget::LoadBudget;
use super::cache_events::{CacheCleared, ResourceEvicted, ResourceFailed, ResourceReady};
use super::event_bus::EventBus;
use super::load_queue::LoadQueue;
use super::pending::Pending;
use super::stats::{CacheSnapshot, CacheStats, CatalogCoverage};
use super::workers::Workers;
use crate::config::CacheConfig;
use crate::entities::{
    CacheError, CatalogIndex, EntryStatus, LoadError, MediaHandle, Priority, ResourceEntry,
    ResourceKey, ResourceLoader,
};

type LoadResult = Result<Arc<dyn MediaHandle>, LoadError>;

/// How many evicted keys keep reporting `Evicted`; older ones fall back to `Unrequested`
const EVICTED_MEMORY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Entry removed from the cache; its handle still needs releasing
type Dropped = (ResourceKey, Option<Arc<dyn MediaHandle>>);

struct Slot {
    status: EntryStatus,
    handle: Option<Arc<dyn MediaHandle>>,
    error: Option<LoadError>,
    last_accessed: u64,
    /// Shared by every caller joining this load
    waiters: Pending<ResourceEntry>,
}

impl Slot {
    fn snapshot(&self, key: &ResourceKey) -> ResourceEntry {
        ResourceEntry {
            key: key.clone(),
            status: self.status,
            handle: self.handle.clone(),
            last_accessed: self.last_accessed,
            error: self.error.clone(),
        }
    }
}

struct CacheState {
    entries: HashMap<ResourceKey, Slot>,
    ready_order: LruCache<ResourceKey, ()>,
    /// Most recent keys dropped by eviction or `clear()`, until requested again
    evicted: LruCache<ResourceKey, ()>,
    queue: LoadQueue,
    budget: LoadBudget,
    /// Monotonic access clock
    tick: u64,
}

impl CacheState {
    fn new(max_concurrent_loads: usize, evicted_memory: NonZeroUsize) -> Self {
        Self {
            entries: HashMap::new(),
            ready_order: LruCache::unbounded(),
            evicted: LruCache::new(evicted_memory),
            queue: LoadQueue::new(),
            budget: LoadBudget::new(max_concurrent_loads),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn status(&self, key: &ResourceKey) -> EntryStatus {
        match self.entries.get(key) {
            Some(slot) => slot.status,
            None if self.evicted.contains(key) => EntryStatus::Evicted,
            None => EntryStatus::Unrequested,
        }
    }

    /// Move queued keys to Loading while the budget allows.
    fn drain_queue(&mut self) -> Vec<ResourceKey> {
        let mut started = Vec::new();
        while self.budget.has_capacity() {
            let Some((key, priority)) = self.queue.pop() else {
                break;
            };
            let Some(slot) = self.entries.get_mut(&key) else {
                continue;
            };
            if slot.status != EntryStatus::Queued {
                continue;
            }
            self.budget.try_acquire();
            slot.status = EntryStatus::Loading;
            trace!("Dequeued {} ({:?})", key, priority);
            started.push(key);
        }
        started
    }

    /// Drop least recently used Ready entries until `entries.len() <= max`.
    ///
    /// `keep` is skipped for this pass (the load that just landed).
    /// Stops early when only Queued/Loading entries are left.
    fn evict_over_capacity(&mut self, max: usize, keep: Option<&ResourceKey>) -> Vec<Dropped> {
        let mut dropped = Vec::new();
        let mut kept = None;

        while self.entries.len() > max {
            let Some((key, ())) = self.ready_order.pop_lru() else {
                break;
            };
            if keep == Some(&key) {
                kept = Some(key);
                continue;
            }
            if let Some(slot) = self.entries.remove(&key) {
                self.evicted.put(key.clone(), ());
                dropped.push((key, slot.handle));
            }
        }

        if let Some(key) = kept {
            self.ready_order.put(key, ());
        }
        dropped
    }
}

struct Inner {
    config: CacheConfig,
    loader: Arc<dyn ResourceLoader>,
    state: Mutex<CacheState>,
    workers: Workers,
    stats: Arc<CacheStats>,
    events: EventBus,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand an admitted key to a loader thread.
    fn start(self: &Arc<Self>, key: ResourceKey) {
        self.stats.record_load_started();
        let inner = Arc::clone(self);
        self.workers.execute(move || inner.run_load(key));
    }

    fn run_load(self: &Arc<Self>, key: ResourceKey) {
        trace!("Loading {}", key);
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(&key)))
            .unwrap_or_else(|_| Err(LoadError::Other(format!("loader panicked on {}", key))));
        self.complete(key, result);
    }

    fn complete(self: &Arc<Self>, key: ResourceKey, result: LoadResult) {
        let mut orphan = None;

        let (finished, started, dropped) = {
            let mut guard = self.lock_state();
            let st = &mut *guard;
            st.budget.release();
            let tick = st.next_tick();

            let finished = match st.entries.get_mut(&key) {
                Some(slot) if slot.status == EntryStatus::Loading => {
                    slot.status = EntryStatus::Ready;
                    slot.last_accessed = tick;
                    match result {
                        Ok(handle) => slot.handle = Some(handle),
                        Err(err) => slot.error = Some(err),
                    }
                    st.ready_order.put(key.clone(), ());
                    Some((slot.waiters.clone(), slot.snapshot(&key)))
                }
                _ => {
                    orphan = result.ok();
                    None
                }
            };

            let started = st.drain_queue();
            let dropped = st.evict_over_capacity(self.config.max_cache_size, Some(&key));
            (finished, started, dropped)
        };

        if let Some(handle) = orphan {
            warn!("Load finished for untracked key {}, releasing", key);
            handle.release();
        }

        for next in started {
            self.start(next);
        }

        self.release_dropped(dropped);

        let Some((waiters, entry)) = finished else {
            return;
        };
        let failure = entry.error.clone();
        waiters.resolve(entry);

        match failure {
            None => {
                debug!("Ready: {}", key);
                self.events.emit(ResourceReady { key });
            }
            Some(error) => {
                warn!("Load failed for {}: {}", key, error);
                self.stats.record_failure();
                self.events.emit(ResourceFailed { key, error });
            }
        }
    }

    fn release_dropped(&self, dropped: Vec<Dropped>) {
        if dropped.is_empty() {
            return;
        }
        self.stats.record_evictions(dropped.len());
        for (key, handle) in dropped {
            if let Some(handle) = handle {
                handle.release();
            }
            debug!("LRU evicted: {}", key);
            self.events.emit(ResourceEvicted { key });
        }
    }
}

/// Shared handle to one cache instance.
///
/// Cloning is cheap; all clones drive the same cache. Construct one per
/// session and pass it to the prefetch policy, the readiness monitor and
/// the idle scheduler.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.lock_state();
        f.debug_struct("ResourceCache")
            .field("entries", &st.entries.len())
            .field("queued", &st.queue.len())
            .field("in_flight", &st.budget.in_flight())
            .finish()
    }
}

impl ResourceCache {
    /// Create a cache and spawn its loader threads.
    pub fn new<L: ResourceLoader + 'static>(config: CacheConfig, loader: L) -> Result<Self, CacheError> {
        config.validate()?;

        info!(
            "ResourceCache init: max_concurrent_loads={}, max_cache_size={}",
            config.max_concurrent_loads, config.max_cache_size
        );

        let state = CacheState::new(config.max_concurrent_loads, EVICTED_MEMORY);

        Ok(Self {
            inner: Arc::new(Inner {
                workers: Workers::new(config.max_concurrent_loads),
                config,
                loader: Arc::new(loader),
                state: Mutex::new(state),
                stats: Arc::new(CacheStats::new()),
                events: EventBus::new(),
            }),
        })
    }

    /// Request a resource.
    ///
    /// - Ready: cache hit, resolved immediately
    /// - Queued/Loading: joins the existing load (no second load is started)
    /// - Unknown: starts now if a slot is free, otherwise queues by priority
    ///
    /// Never blocks. The returned `Pending` resolves once the entry is
    /// terminal (Ready, possibly failed) or dropped by `clear()`.
    pub fn request(&self, key: ResourceKey, priority: Priority) -> Pending<ResourceEntry> {
        let (status, waiters) = {
            let mut guard = self.inner.lock_state();
            let st = &mut *guard;
            let tick = st.next_tick();

            if let Some(slot) = st.entries.get_mut(&key) {
                slot.last_accessed = tick;
                if slot.status == EntryStatus::Ready {
                    st.ready_order.promote(&key);
                    self.inner.stats.record_hit();
                    trace!("Cache hit: {}", key);
                    return Pending::resolved(slot.snapshot(&key));
                }
                self.inner.stats.record_join();
                trace!("Joining {:?} load: {}", slot.status, key);
                return slot.waiters.clone();
            }

            st.evicted.pop(&key);
            let status = if st.budget.try_acquire() {
                EntryStatus::Loading
            } else {
                debug_assert!(!st.queue.contains(&key), "untracked key already queued: {}", key);
                st.queue.push(key.clone(), priority);
                EntryStatus::Queued
            };

            let waiters = Pending::new();
            st.entries.insert(
                key.clone(),
                Slot {
                    status,
                    handle: None,
                    error: None,
                    last_accessed: tick,
                    waiters: waiters.clone(),
                },
            );
            (status, waiters)
        };

        self.inner.stats.record_miss();
        debug!("Requested {} ({:?}) -> {:?}", key, priority, status);

        if status == EntryStatus::Loading {
            self.inner.start(key);
        }
        waiters
    }

    /// Request every key not already Ready, Loading or Queued. Non-blocking.
    ///
    /// Returns how many keys were submitted.
    pub fn preload_many<I>(&self, keys: I, priority: Priority) -> usize
    where
        I: IntoIterator<Item = ResourceKey>,
    {
        let mut submitted = 0;
        for key in keys {
            if self.status(&key).is_tracked() {
                continue;
            }
            self.request(key, priority);
            submitted += 1;
        }
        if submitted > 0 {
            debug!("preload_many: submitted {} keys ({:?})", submitted, priority);
        }
        submitted
    }

    /// Run the eviction policy now. Returns the number of entries evicted.
    ///
    /// Also runs automatically after every load completion.
    pub fn evict_if_over_capacity(&self) -> usize {
        let dropped = self
            .inner
            .lock_state()
            .evict_over_capacity(self.inner.config.max_cache_size, None);
        let count = dropped.len();
        self.inner.release_dropped(dropped);
        count
    }

    /// Drop every Ready and Queued entry (navigation invalidation).
    ///
    /// Queued waiters resolve with an `Evicted` entry. Loads already in
    /// flight are not cancelled; they land in the cache when done.
    pub fn clear(&self) -> usize {
        let (ready, queued) = {
            let mut guard = self.inner.lock_state();
            let st = &mut *guard;

            let mut queued = Vec::new();
            for key in st.queue.drain() {
                if let Some(slot) = st.entries.remove(&key) {
                    st.evicted.put(key.clone(), ());
                    queued.push((key, slot));
                }
            }

            let ready_keys: Vec<ResourceKey> = st
                .entries
                .iter()
                .filter(|(_, slot)| slot.status == EntryStatus::Ready)
                .map(|(key, _)| key.clone())
                .collect();
            let mut ready = Vec::with_capacity(ready_keys.len());
            for key in ready_keys {
                if let Some(slot) = st.entries.remove(&key) {
                    st.evicted.put(key.clone(), ());
                    ready.push((key, slot.handle));
                }
            }
            st.ready_order.clear();

            (ready, queued)
        };

        let dropped = ready.len() + queued.len();

        for (key, slot) in queued {
            let mut entry = slot.snapshot(&key);
            entry.status = EntryStatus::Evicted;
            slot.waiters.resolve(entry);
        }
        for handle in ready.into_iter().filter_map(|(_, handle)| handle) {
            handle.release();
        }

        info!("Cache cleared: {} entries dropped", dropped);
        self.inner.events.emit(CacheCleared { dropped });
        dropped
    }

    /// True iff the entry is Ready (including terminal failures).
    pub fn is_cached(&self, key: &ResourceKey) -> bool {
        self.status(key) == EntryStatus::Ready
    }

    pub fn is_loading(&self, key: &ResourceKey) -> bool {
        self.status(key) == EntryStatus::Loading
    }

    pub fn is_queued(&self, key: &ResourceKey) -> bool {
        self.status(key) == EntryStatus::Queued
    }

    pub fn status(&self, key: &ResourceKey) -> EntryStatus {
        self.inner.lock_state().status(key)
    }

    /// Playable handle for a Ready entry; counts as an access.
    ///
    /// `None` for unknown, pending and failed keys.
    pub fn get_handle(&self, key: &ResourceKey) -> Option<Arc<dyn MediaHandle>> {
        let mut guard = self.inner.lock_state();
        let st = &mut *guard;
        let tick = st.next_tick();
        let handle = match st.entries.get_mut(key) {
            Some(slot) if slot.status == EntryStatus::Ready => {
                slot.last_accessed = tick;
                st.ready_order.promote(key);
                slot.handle.clone()
            }
            _ => None,
        };
        if handle.is_some() {
            self.inner.stats.record_hit();
        } else {
            self.inner.stats.record_miss();
        }
        handle
    }

    /// Snapshot of a live entry without touching its access time.
    pub fn entry(&self, key: &ResourceKey) -> Option<ResourceEntry> {
        self.inner.lock_state().entries.get(key).map(|slot| slot.snapshot(key))
    }

    /// How many catalog positions are Ready with a usable handle.
    pub fn coverage(&self, catalog: &CatalogIndex) -> CatalogCoverage {
        let st = self.inner.lock_state();
        let cached = catalog
            .keys()
            .iter()
            .filter(|key| {
                st.entries
                    .get(*key)
                    .is_some_and(|slot| slot.status == EntryStatus::Ready && slot.handle.is_some())
            })
            .count();
        CatalogCoverage::new(catalog.len(), cached)
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let stats = &self.inner.stats;
        let mut snap = CacheSnapshot {
            max_concurrent_loads: self.inner.config.max_concurrent_loads,
            max_cache_size: self.inner.config.max_cache_size,
            hits: stats.hits(),
            misses: stats.misses(),
            joins: stats.joins(),
            evictions: stats.evictions(),
            hit_rate: stats.hit_rate(),
            ..Default::default()
        };

        let st = self.inner.lock_state();
        snap.total = st.entries.len();
        snap.in_flight = st.budget.in_flight();
        snap.peak_in_flight = st.budget.peak();
        for slot in st.entries.values() {
            match (slot.status, &slot.handle) {
                (EntryStatus::Ready, Some(handle)) => {
                    snap.cached += 1;
                    snap.total_size_bytes += handle.size_hint().unwrap_or(0);
                }
                (EntryStatus::Ready, None) => snap.failed += 1,
                (EntryStatus::Loading, _) => snap.loading += 1,
                (EntryStatus::Queued, _) => snap.queued += 1,
                _ => {}
            }
        }
        snap
    }

    /// Live entries (Queued + Loading + Ready)
    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock_state().budget.in_flight()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.inner.lock_state().budget.peak()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.inner.stats)
    }

    /// Subscription point for `ResourceReady` / `ResourceFailed` /
    /// `ResourceEvicted` / `CacheCleared`.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{MockLoader, key, keys, wait_until};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const LONG: Duration = Duration::from_secs(2);

    fn config(max_concurrent_loads: usize, max_cache_size: usize) -> CacheConfig {
        CacheConfig {
            max_concurrent_loads,
            max_cache_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_concurrent_requests_share_one_load() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(2, 10), Arc::clone(&loader)).unwrap();

        let pendings: Vec<Pending<ResourceEntry>> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.request(key("reel"), Priority::Normal))
            })
            .map(|t| t.join().unwrap())
            .collect();

        assert!(pendings.iter().all(|p| p.same_as(&pendings[0])));
        gate.send(()).unwrap();

        let entries: Vec<ResourceEntry> = pendings.iter().map(|p| p.wait()).collect();
        let first = entries[0].handle.clone().unwrap();
        for entry in &entries {
            assert_eq!(entry.status, EntryStatus::Ready);
            assert!(Arc::ptr_eq(entry.handle.as_ref().unwrap(), &first));
        }
        assert_eq!(loader.call_count("reel"), 1);
        assert_eq!(cache.stats().joins(), 7);
    }

    #[test]
    fn test_in_flight_never_exceeds_budget() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(2, 10), Arc::clone(&loader)).unwrap();

        let names = ["a", "b", "c", "d", "e", "f"];
        let pendings: Vec<_> = keys(&names)
            .into_iter()
            .map(|k| cache.request(k, Priority::Normal))
            .collect();

        assert!(wait_until(LONG, || loader.active() == 2));
        assert_eq!(cache.in_flight(), 2);
        assert_eq!(cache.queued_len(), 4);

        for _ in &names {
            gate.send(()).unwrap();
        }
        for p in &pendings {
            assert!(p.wait_timeout(LONG).is_some());
        }

        assert!(loader.max_active() <= 2);
        assert_eq!(cache.peak_in_flight(), 2);
        assert!(wait_until(LONG, || cache.in_flight() == 0));
        assert_eq!(loader.total_calls(), names.len());
    }

    #[test]
    fn test_high_priority_jumps_queue() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(1, 10), Arc::clone(&loader)).unwrap();

        let blocker = cache.request(key("blocker"), Priority::Normal);
        assert!(wait_until(LONG, || loader.active() == 1));

        let a = cache.request(key("a"), Priority::Normal);
        let b = cache.request(key("b"), Priority::Normal);
        let c = cache.request(key("c"), Priority::High);
        assert!(cache.is_queued(&key("a")));
        assert!(cache.is_loading(&key("blocker")));

        for _ in 0..4 {
            gate.send(()).unwrap();
        }
        for p in [&blocker, &a, &b, &c] {
            assert!(p.wait_timeout(LONG).is_some());
        }

        assert_eq!(loader.calls(), ["blocker", "c", "a", "b"]);
    }

    #[test]
    fn test_pending_entries_are_never_evicted() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(1, 1), Arc::clone(&loader)).unwrap();

        let a = cache.request(key("a"), Priority::Normal);
        let b = cache.request(key("b"), Priority::Normal);
        let c = cache.request(key("c"), Priority::Normal);
        assert!(wait_until(LONG, || loader.active() == 1));

        // 3 entries over a capacity of 1, none Ready
        assert_eq!(cache.evict_if_over_capacity(), 0);
        assert_eq!(cache.len(), 3);
        assert!(cache.is_loading(&key("a")));
        assert!(cache.is_queued(&key("b")));
        assert!(cache.is_queued(&key("c")));

        for _ in 0..3 {
            gate.send(()).unwrap();
        }
        for p in [&a, &b, &c] {
            assert!(p.wait_timeout(LONG).is_some());
        }

        // Each completion could only evict entries that were already Ready
        assert!(wait_until(LONG, || cache.len() == 1));
        assert!(cache.is_cached(&key("c")));
        assert_eq!(cache.status(&key("a")), EntryStatus::Evicted);
        assert_eq!(cache.status(&key("b")), EntryStatus::Evicted);
        assert!(loader.handle("a").unwrap().is_released());
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let loader = MockLoader::instant();
        let cache = ResourceCache::new(config(1, 3), Arc::clone(&loader)).unwrap();

        for name in ["x", "y", "z"] {
            cache.request(key(name), Priority::Normal).wait();
        }
        // Touch y so recency is x < z < y
        assert!(cache.request(key("y"), Priority::Normal).wait().is_ready());

        let tick = |name: &str| cache.entry(&key(name)).unwrap().last_accessed;
        assert!(tick("x") < tick("z"));
        assert!(tick("z") < tick("y"));

        cache.request(key("w"), Priority::Normal).wait();

        assert_eq!(cache.status(&key("x")), EntryStatus::Evicted);
        assert!(loader.handle("x").unwrap().is_released());
        for name in ["y", "z", "w"] {
            assert!(cache.is_cached(&key(name)), "{} should stay cached", name);
        }
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_failure_releases_slot_and_is_not_retried() {
        let loader = MockLoader::instant();
        loader.fail_on("bad");
        let cache = ResourceCache::new(config(1, 10), Arc::clone(&loader)).unwrap();

        let failed = cache.request(key("bad"), Priority::Normal).wait();
        assert!(failed.is_failed());
        assert!(matches!(failed.error, Some(LoadError::Io(_))));
        assert!(cache.get_handle(&key("bad")).is_none());

        let good = cache.request(key("good"), Priority::Normal).wait_timeout(LONG).unwrap();
        assert!(good.handle.is_some());
        assert!(wait_until(LONG, || cache.in_flight() == 0));

        // Terminal: a second request is a hit on the failed entry
        assert!(cache.request(key("bad"), Priority::High).wait().is_failed());
        assert_eq!(loader.call_count("bad"), 1);
        assert_eq!(cache.stats().load_failures(), 1);
    }

    #[test]
    fn test_panicking_loader_counts_as_failure() {
        struct Exploding;
        impl ResourceLoader for Exploding {
            fn load(&self, key: &ResourceKey) -> LoadResult {
                panic!("boom: {}", key);
            }
        }

        let cache = ResourceCache::new(config(1, 10), Exploding).unwrap();
        let entry = cache.request(key("k"), Priority::Normal).wait_timeout(LONG).unwrap();
        assert!(entry.is_failed());
        assert!(matches!(entry.error, Some(LoadError::Other(_))));
        assert!(wait_until(LONG, || cache.in_flight() == 0));
    }

    #[test]
    fn test_hit_refreshes_access_and_counts() {
        let loader = MockLoader::instant();
        let cache = ResourceCache::new(config(2, 10), Arc::clone(&loader)).unwrap();

        let first = cache.request(key("a"), Priority::Normal).wait();
        let again = cache.request(key("a"), Priority::Normal);
        assert!(again.is_resolved());
        assert!(again.wait().last_accessed > first.last_accessed);

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(loader.call_count("a"), 1);
    }

    #[test]
    fn test_preload_many_skips_known_keys() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(1, 10), Arc::clone(&loader)).unwrap();

        cache.request(key("a"), Priority::Normal);
        let submitted = cache.preload_many(keys(&["a", "b", "c", "b"]), Priority::Normal);
        assert_eq!(submitted, 2);
        assert_eq!(cache.len(), 3);

        drop(gate);
        assert!(wait_until(LONG, || cache.is_cached(&key("c"))));
        assert_eq!(loader.total_calls(), 3);
    }

    #[test]
    fn test_clear_drops_ready_and_queued_only() {
        let (loader, gate) = MockLoader::gated();
        let cache = ResourceCache::new(config(1, 10), Arc::clone(&loader)).unwrap();

        gate.send(()).unwrap();
        cache.request(key("ready"), Priority::Normal).wait();

        let loading = cache.request(key("loading"), Priority::Normal);
        let queued = cache.request(key("queued"), Priority::Normal);
        assert!(wait_until(LONG, || loader.active() == 1));

        assert_eq!(cache.clear(), 2);
        assert_eq!(queued.wait().status, EntryStatus::Evicted);
        assert_eq!(cache.status(&key("ready")), EntryStatus::Evicted);
        assert!(loader.handle("ready").unwrap().is_released());
        assert!(cache.is_loading(&key("loading")));

        gate.send(()).unwrap();
        assert!(loading.wait_timeout(LONG).unwrap().is_ready());
        assert!(cache.is_cached(&key("loading")));
        assert_eq!(loader.call_count("queued"), 0);

        // Evicted keys can be requested again
        gate.send(()).unwrap();
        assert!(cache.request(key("ready"), Priority::Normal).wait_timeout(LONG).unwrap().is_ready());
        assert_eq!(loader.call_count("ready"), 2);
    }

    #[test]
    fn test_clear_keeps_earlier_evictions() {
        let loader = MockLoader::instant();
        let cache = ResourceCache::new(config(1, 1), Arc::clone(&loader)).unwrap();

        cache.request(key("x"), Priority::Normal).wait();
        cache.request(key("y"), Priority::Normal).wait();
        assert_eq!(cache.status(&key("x")), EntryStatus::Evicted);

        assert_eq!(cache.clear(), 1);
        assert_eq!(cache.status(&key("x")), EntryStatus::Evicted);
        assert_eq!(cache.status(&key("y")), EntryStatus::Evicted);
        assert_eq!(cache.status(&key("z")), EntryStatus::Unrequested);
    }

    #[test]
    fn test_evicted_memory_is_bounded() {
        let mut st = CacheState::new(1, NonZeroUsize::new(2).unwrap());
        for name in ["a", "b", "c"] {
            let tick = st.next_tick();
            st.entries.insert(
                key(name),
                Slot {
                    status: EntryStatus::Ready,
                    handle: None,
                    error: None,
                    last_accessed: tick,
                    waiters: Pending::new(),
                },
            );
            st.ready_order.put(key(name), ());
        }

        assert_eq!(st.evict_over_capacity(0, None).len(), 3);
        assert_eq!(st.status(&key("a")), EntryStatus::Unrequested);
        assert_eq!(st.status(&key("b")), EntryStatus::Evicted);
        assert_eq!(st.status(&key("c")), EntryStatus::Evicted);
    }

    #[test]
    fn test_events_announce_outcomes() {
        let loader = MockLoader::instant();
        loader.fail_on("bad");
        let cache = ResourceCache::new(config(2, 1), Arc::clone(&loader)).unwrap();

        let ready = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ready);
        cache.events().subscribe::<ResourceReady, _>(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        let f = Arc::clone(&failed);
        cache.events().subscribe::<ResourceFailed, _>(move |e| {
            assert_eq!(e.key.as_str(), "bad");
            f.fetch_add(1, Ordering::SeqCst);
        });

        cache.request(key("a"), Priority::Normal).wait();
        cache.request(key("bad"), Priority::Normal).wait();

        assert!(wait_until(LONG, || ready.load(Ordering::SeqCst) == 1));
        assert!(wait_until(LONG, || failed.load(Ordering::SeqCst) == 1));
        // Capacity 1: "a" made room for "bad"
        assert_eq!(cache.status(&key("a")), EntryStatus::Evicted);
    }

    #[test]
    fn test_snapshot_and_coverage() {
        let loader = MockLoader::instant();
        loader.fail_on("b");
        let cache = ResourceCache::new(config(2, 10), Arc::clone(&loader)).unwrap();

        cache.request(key("a"), Priority::Normal).wait();
        cache.request(key("b"), Priority::Normal).wait();
        assert!(wait_until(LONG, || cache.in_flight() == 0));

        let snap = cache.snapshot();
        assert_eq!(snap.cached, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.total_size_bytes, 1024);
        assert_eq!(snap.max_cache_size, 10);

        let catalog: CatalogIndex = keys(&["a", "b", "c", "d"]).into_iter().collect();
        let coverage = cache.coverage(&catalog);
        assert_eq!((coverage.total, coverage.cached, coverage.percent), (4, 1, 25));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = ResourceCache::new(config(0, 10), MockLoader::instant());
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }
}
