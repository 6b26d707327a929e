//! Loader thread pool.
//!
//! The cache admits at most `max_concurrent_loads` loads at a time and the
//! pool is sized to match, so an admitted load never waits for a thread.
//! Ordering between loads is decided by `LoadQueue` before a job reaches
//! the pool; the pool only runs what it is given, oldest first.
//!
//! Jobs go into a global `Injector`; each thread pulls batches into its own
//! FIFO deque and steals from siblings when both are empty.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long `Drop` waits for threads to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` loader threads (at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(Worker::stealer).collect();

        let handles = locals
            .into_iter()
            .enumerate()
            .map(|(id, local)| {
                let injector = Arc::clone(&injector);
                let shutdown = Arc::clone(&shutdown);
                let stealers = stealers.clone();
                thread::Builder::new()
                    .name(format!("reelcache-loader-{}", id))
                    .spawn(move || run_worker(id, local, &injector, &stealers, &shutdown))
                    .expect("Failed to spawn loader thread")
            })
            .collect();

        trace!("Workers initialized: {} loader threads", num_threads);

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    /// Queue a job; it runs on the first free loader thread.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    /// Number of loader threads
    pub fn size(&self) -> usize {
        self.handles.len()
    }
}

fn run_worker(
    id: usize,
    local: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Loader {} started", id);
    loop {
        let job = local.pop().or_else(|| {
            std::iter::repeat_with(|| {
                injector
                    .steal_batch_and_pop(&local)
                    .or_else(|| stealers.iter().map(|s| s.steal()).collect())
            })
            .find(|s| !s.is_retry())
            .and_then(|s| s.success())
        });

        if let Some(job) = job {
            job();
            continue;
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // Idle back-off
        thread::sleep(Duration::from_millis(1));
    }
    trace!("Loader {} stopped", id);
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // The last cache handle can be dropped from inside a finished load job,
        // i.e. on one of our own threads; never wait for ourselves.
        let current = thread::current().id();
        let deadline = Instant::now() + SHUTDOWN_GRACE;

        for handle in std::mem::take(&mut self.handles) {
            if handle.thread().id() == current {
                continue;
            }
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining loaders");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} loaders stopped", num_threads);
    }
}
