//! Shared fixtures for core tests: scripted loader and handle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::entities::{LoadError, MediaHandle, ReadyState, ResourceKey, ResourceLoader, TimeRange};

pub fn key(s: &str) -> ResourceKey {
    ResourceKey::new(s).unwrap()
}

pub fn keys(names: &[&str]) -> Vec<ResourceKey> {
    names.iter().map(|n| key(n)).collect()
}

/// Poll `cond` until true or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Handle with scripted buffering
#[derive(Debug)]
pub struct MockHandle {
    pub buffered: Mutex<Vec<TimeRange>>,
    pub current_time: Mutex<f64>,
    pub ready_state: Mutex<ReadyState>,
    pub released: AtomicBool,
    pub size: u64,
}

impl MockHandle {
    /// Fully buffered, ready to play
    pub fn ready() -> Self {
        Self::with(vec![TimeRange::everything()], ReadyState::HaveEnoughData)
    }

    /// Never gains any buffer
    pub fn starving() -> Self {
        Self::with(Vec::new(), ReadyState::HaveMetadata)
    }

    pub fn with(buffered: Vec<TimeRange>, state: ReadyState) -> Self {
        Self {
            buffered: Mutex::new(buffered),
            current_time: Mutex::new(0.0),
            ready_state: Mutex::new(state),
            released: AtomicBool::new(false),
            size: 1024,
        }
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        *self.buffered.lock().unwrap() = ranges;
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        *self.ready_state.lock().unwrap() = state;
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl MediaHandle for MockHandle {
    fn buffered(&self) -> Vec<TimeRange> {
        self.buffered.lock().unwrap().clone()
    }

    fn current_time(&self) -> f64 {
        *self.current_time.lock().unwrap()
    }

    fn ready_state(&self) -> ReadyState {
        *self.ready_state.lock().unwrap()
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

type HandleFactory = Box<dyn Fn(&ResourceKey) -> Arc<MockHandle> + Send + Sync>;

/// Loader that records every call and can hold loads until released
pub struct MockLoader {
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    permits: Option<Receiver<()>>,
    failing: Mutex<HashSet<String>>,
    handles: Mutex<HashMap<String, Arc<MockHandle>>>,
    factory: HandleFactory,
}

impl MockLoader {
    fn build(permits: Option<Receiver<()>>, factory: HandleFactory) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            permits,
            failing: Mutex::new(HashSet::new()),
            handles: Mutex::new(HashMap::new()),
            factory,
        }
    }

    /// Loads complete immediately with a ready handle
    pub fn instant() -> Arc<Self> {
        Arc::new(Self::build(None, Box::new(|_| Arc::new(MockHandle::ready()))))
    }

    /// Loads complete immediately with a handle that never buffers
    pub fn starving() -> Arc<Self> {
        Arc::new(Self::build(None, Box::new(|_| Arc::new(MockHandle::starving()))))
    }

    /// Each load blocks until one `()` is sent on the returned sender
    /// (or the sender is dropped).
    pub fn gated() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let loader = Self::build(Some(rx), Box::new(|_| Arc::new(MockHandle::ready())));
        (Arc::new(loader), tx)
    }

    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Keys in the order loads started
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Handle produced for `key`, if it loaded
    pub fn handle(&self, key: &str) -> Option<Arc<MockHandle>> {
        self.handles.lock().unwrap().get(key).cloned()
    }
}

impl ResourceLoader for MockLoader {
    fn load(&self, key: &ResourceKey) -> Result<Arc<dyn MediaHandle>, LoadError> {
        self.calls.lock().unwrap().push(key.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(permits) = &self.permits {
            let _ = permits.recv();
        }

        let result = if self.failing.lock().unwrap().contains(key.as_str()) {
            Err(LoadError::Io(format!("connection reset: {}", key)))
        } else {
            let handle = (self.factory)(key);
            self.handles.lock().unwrap().insert(key.to_string(), Arc::clone(&handle));
            Ok(handle as Arc<dyn MediaHandle>)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
