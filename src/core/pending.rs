//! One-shot shared result slot.
//!
//! `Pending<T>` is what `ResourceCache::request` and
//! `BufferReadinessMonitor::ensure_ready` hand back. Every clone observes
//! the same slot, so all callers joining one load resolve together.
//!
//! Two ways to consume it:
//! - `.await` it (implements `Future`, wakers are stored per poll)
//! - block on `wait()` / `wait_timeout()` from a plain thread
//!
//! The slot is written once; later `resolve` calls are ignored.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

struct Slot<T> {
    value: Option<T>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    cv: Condvar,
}

pub struct Pending<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self
            .shared
            .slot
            .lock()
            .map(|s| s.value.is_some())
            .unwrap_or(false);
        f.debug_struct("Pending").field("resolved", &resolved).finish()
    }
}

impl<T: Clone> Pending<T> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    value: None,
                    wakers: Vec::new(),
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// Already-completed pending (cache hit).
    pub fn resolved(value: T) -> Self {
        let pending = Self::new();
        pending.resolve(value);
        pending
    }

    /// Store the value and wake every waiter. Returns false if already resolved.
    pub(crate) fn resolve(&self, value: T) -> bool {
        let wakers = {
            let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(value);
            std::mem::take(&mut slot.wakers)
        };
        self.shared.cv.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .is_some()
    }

    /// Non-blocking peek.
    pub fn try_get(&self) -> Option<T> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .clone()
    }

    /// Block the current thread until resolved.
    pub fn wait(&self) -> T {
        let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(value) = &slot.value {
                return value.clone();
            }
            slot = self.shared.cv.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block up to `timeout`; `None` if still unresolved.
    ///
    /// A timeout too large to represent as an `Instant` waits like `wait()`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(value) = &slot.value {
                return Some(value.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .shared
                .cv
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// True if both handles observe the same slot.
    pub fn same_as(&self, other: &Pending<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone> Future for Pending<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(value) = &slot.value {
            return Poll::Ready(value.clone());
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
