//! Idle-triggered background fill.
//!
//! After `idle_delay` without activity, every catalog key that is not
//! already tracked by the cache is submitted at `Normal` priority, one at
//! a time, `idle_spacing` apart. Any activity aborts the fill and restarts
//! the countdown.
//!
//! Driven by one background thread fed over a channel:
//! ```text
//! mark_activity() ──Activity──► driver: countdown ─(expired)─► fill ─(done)─► wait for activity
//!                                   ▲                           │
//!                                   └──────────Activity─────────┘
//! ```
//! `mark_activity` bumps the fill epoch before signalling, so a submission
//! the driver has not issued yet is dropped even if the signal is still in
//! flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indexmap::IndexSet;
use log::{debug, info, trace, warn};

use super::resource_cache::ResourceCache;
use crate::entities::{CatalogIndex, Priority, ResourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    /// Counting down, or waiting for the next activity after a finished fill
    Active,
    IdleFilling,
}

enum Signal {
    Activity,
    Shutdown,
}

/// What ended one fill pass
enum FillEnd {
    Completed,
    Aborted,
    Shutdown,
}

struct Shared {
    cache: ResourceCache,
    catalog: RwLock<CatalogIndex>,
    epoch: AtomicU64,
    filling: AtomicBool,
    submitted: AtomicUsize,
}

impl Shared {
    /// Catalog keys the cache does not know yet, in catalog order.
    fn fill_candidates(&self) -> Vec<ResourceKey> {
        let catalog = self.catalog.read().unwrap_or_else(|e| e.into_inner());
        let unique: IndexSet<&ResourceKey> = catalog.keys().iter().collect();
        unique
            .into_iter()
            .filter(|key| !self.cache.status(key).is_tracked())
            .cloned()
            .collect()
    }
}

pub struct IdlePreloadScheduler {
    shared: Arc<Shared>,
    tx: Sender<Signal>,
    driver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for IdlePreloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdlePreloadScheduler")
            .field("state", &self.state())
            .field("submitted", &self.submitted())
            .finish()
    }
}

impl IdlePreloadScheduler {
    /// Start the driver thread; the idle countdown begins immediately.
    pub fn new(cache: ResourceCache, catalog: CatalogIndex) -> Self {
        let delay = cache.config().idle_delay();
        let spacing = cache.config().idle_spacing();
        let shared = Arc::new(Shared {
            cache,
            catalog: RwLock::new(catalog),
            epoch: AtomicU64::new(0),
            filling: AtomicBool::new(false),
            submitted: AtomicUsize::new(0),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let driver_shared = Arc::clone(&shared);
        let driver = thread::Builder::new()
            .name("reelcache-idle".into())
            .spawn(move || drive(&driver_shared, &rx, delay, spacing));

        let driver = match driver {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn idle scheduler thread, idle fill disabled: {}", e);
                None
            }
        };

        Self { shared, tx, driver }
    }

    /// User did something: stop filling and restart the countdown.
    pub fn mark_activity(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.filling.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Signal::Activity);
    }

    /// Replace the catalog used by the next fill.
    pub fn set_catalog(&self, catalog: CatalogIndex) {
        *self.shared.catalog.write().unwrap_or_else(|e| e.into_inner()) = catalog;
    }

    pub fn state(&self) -> IdleState {
        if self.is_filling() {
            IdleState::IdleFilling
        } else {
            IdleState::Active
        }
    }

    pub fn is_filling(&self) -> bool {
        self.shared.filling.load(Ordering::SeqCst)
    }

    /// Total keys submitted by background fills
    pub fn submitted(&self) -> usize {
        self.shared.submitted.load(Ordering::SeqCst)
    }
}

impl Drop for IdlePreloadScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Signal::Shutdown);
        if let Some(handle) = self.driver.take() {
            let _ = handle.join();
        }
        trace!("Idle scheduler stopped");
    }
}

fn drive(shared: &Shared, rx: &Receiver<Signal>, delay: Duration, spacing: Duration) {
    loop {
        // Taken before the countdown: activity during or after it invalidates the fill
        let epoch = shared.epoch.load(Ordering::SeqCst);
        match rx.recv_timeout(delay) {
            Ok(Signal::Activity) => continue,
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        match fill(shared, rx, spacing, epoch) {
            FillEnd::Shutdown => return,
            FillEnd::Aborted => continue,
            FillEnd::Completed => {}
        }

        // Nothing left to fill until the user moves again
        match rx.recv() {
            Ok(Signal::Activity) => continue,
            Ok(Signal::Shutdown) | Err(_) => return,
        }
    }
}

/// One fill pass owned by `epoch`; every submission first checks the epoch is still current.
fn fill(shared: &Shared, rx: &Receiver<Signal>, spacing: Duration, epoch: u64) -> FillEnd {
    if shared.epoch.load(Ordering::SeqCst) != epoch {
        return abort(shared, 0);
    }
    shared.filling.store(true, Ordering::SeqCst);

    let candidates = shared.fill_candidates();
    info!("Idle fill started: {} keys", candidates.len());

    let mut issued = 0;
    for (i, key) in candidates.into_iter().enumerate() {
        if i > 0 {
            match rx.recv_timeout(spacing) {
                Ok(Signal::Activity) => return abort(shared, issued),
                Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return FillEnd::Shutdown,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        if shared.epoch.load(Ordering::SeqCst) != epoch {
            return abort(shared, issued);
        }

        trace!("Idle fill: {}", key);
        let n = shared.cache.preload_many([key], Priority::Normal);
        shared.submitted.fetch_add(n, Ordering::SeqCst);
        issued += n;
    }

    shared.filling.store(false, Ordering::SeqCst);
    info!("Idle fill finished: {} keys submitted", issued);
    FillEnd::Completed
}

/// Only the driver thread sets `filling`, so clearing it here cannot hide a newer fill.
fn abort(shared: &Shared, issued: usize) -> FillEnd {
    shared.filling.store(false, Ordering::SeqCst);
    debug!("Idle fill aborted by activity after {} keys", issued);
    FillEnd::Aborted
}
