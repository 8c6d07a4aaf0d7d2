//! Background job runners for prefetch and cache writes.
//!
//! `Workers` is a work-stealing thread pool:
//! - Jobs are pushed to a global injector
//! - Idle workers steal from each other, zero lock contention between workers
//!
//! Cancellation is epoch-based. A session owns an `Epoch`; every job captures
//! an `EpochTicket` and checks it between steps. Advancing the epoch (on
//! destroy) makes every outstanding ticket stale, so in-flight work abandons
//! its continuation instead of touching a torn-down session.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::{trace, warn};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared pool used when the host does not supply one
static SHARED_POOL: Lazy<Arc<Workers>> = Lazy::new(|| {
    let threads = (num_cpus::get() / 2).clamp(1, 4);
    let pool = Workers::new(threads);
    if pool.threads() < threads {
        warn!("Shared pool started {} of {} workers", pool.threads(), threads);
    }
    Arc::new(pool)
});

/// Abstract job runner
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(job)
    }
}

/// Process-wide worker pool
pub fn shared_pool() -> Arc<dyn WorkerPool> {
    SHARED_POOL.clone()
}

/// Runs every job immediately on the calling thread.
///
/// For single-threaded hosts and deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}

/// Cancellation counter owned by one session
#[derive(Debug, Clone, Default)]
pub struct Epoch {
    current: Arc<AtomicU64>,
}

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding tickets
    pub fn advance(&self) -> u64 {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        trace!("Epoch advanced: {}", next);
        next
    }

    /// Ticket for work started now
    pub fn ticket(&self) -> EpochTicket {
        EpochTicket {
            value: self.current(),
            shared: Arc::clone(&self.current),
        }
    }
}

/// Snapshot of an `Epoch`, stale once the epoch advances
#[derive(Debug, Clone)]
pub struct EpochTicket {
    value: u64,
    shared: Arc<AtomicU64>,
}

impl EpochTicket {
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_current(&self) -> bool {
        self.shared.load(Ordering::Acquire) == self.value
    }
}

/// Work-stealing thread pool
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers").field("threads", &self.threads()).finish()
    }
}

impl Workers {
    /// Create pool with `num_threads` workers (at least one)
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("alphaplay-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, local, &injector, &stealers, &shutdown));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("Failed to spawn worker thread {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }
}

fn worker_loop(
    worker_id: usize,
    local: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Worker {} started", worker_id);
    loop {
        // own queue, then global injector, then other workers
        let job = local
            .pop()
            .or_else(|| injector.steal_batch_and_pop(&local).success())
            .or_else(|| stealers.iter().find_map(|s| s.steal().success()));

        if let Some(job) = job {
            job();
            continue;
        }
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    trace!("Worker {} stopped", worker_id);
}

impl WorkerPool for Workers {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.injector.push(job);
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // 500ms for all threads; a blocked fetch must not hang the host
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_inline_pool_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        InlinePool.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_workers_run_all_jobs() {
        let workers = Workers::new(3);
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..32 {
            let tx = tx.clone();
            workers.execute(Box::new(move || {
                let _ = tx.send(i);
            }));
        }
        let mut got: Vec<i32> = (0..32)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_epoch_ticket_goes_stale() {
        let epoch = Epoch::new();
        let ticket = epoch.ticket();
        assert!(ticket.is_current());
        assert_eq!(epoch.advance(), 1);
        assert!(!ticket.is_current());
        assert!(epoch.ticket().is_current());
    }

    #[test]
    fn test_shared_pool_executes() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        shared_pool().execute(Box::new(move || {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }
}
