//! Host-provided thread pools.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::error;

use super::publisher::{claim_thread, next_owner_id, owns_current_thread, run_isolated, Publisher, Work};

/// A publisher that orders queued work by priority (higher first, FIFO
/// within a priority).
pub trait PriorityPool: Publisher {
    fn submit(&self, priority: i32, work: Work);
}

/// Factory for the pools the engine needs, supplied by the host so the
/// engine stays independent of any particular threading runtime.
pub trait ThreadPools: Send + Sync {
    /// A pool running at most `max_threads` pieces of work at once.
    fn bounded(&self, name: &str, max_threads: usize) -> io::Result<Arc<dyn Publisher>>;

    /// A pool of `threads` workers taking work in priority order.
    fn prioritized(&self, name: &str, threads: usize) -> io::Result<Arc<dyn PriorityPool>>;
}

/// Bounded pools on a tokio runtime, priority pools on std threads.
pub struct DefaultThreadPools {
    handle: Handle,
    _runtime: Option<Arc<Runtime>>,
}

impl DefaultThreadPools {
    /// Build a private runtime for the pools.
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("thingspace-pools")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(runtime)),
        })
    }

    /// Use an existing runtime.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }
}

impl ThreadPools for DefaultThreadPools {
    fn bounded(&self, name: &str, max_threads: usize) -> io::Result<Arc<dyn Publisher>> {
        Ok(Arc::new(BoundedPublisher {
            name: Arc::from(name),
            owner: next_owner_id(),
            handle: self.handle.clone(),
            permits: Arc::new(Semaphore::new(max_threads.max(1))),
        }))
    }

    fn prioritized(&self, name: &str, threads: usize) -> io::Result<Arc<dyn PriorityPool>> {
        Ok(Arc::new(StdPriorityPool::new(name, threads)?))
    }
}

/// Runs work on tokio's blocking threads, at most `permits` at a time.
struct BoundedPublisher {
    name: Arc<str>,
    owner: u64,
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl Publisher for BoundedPublisher {
    fn publish(&self, work: Work) {
        if owns_current_thread(self.owner) {
            work();
            return;
        }
        let name = Arc::clone(&self.name);
        let owner = self.owner;
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let joined = tokio::task::spawn_blocking(move || {
                claim_thread(owner);
                run_isolated(&name, work);
                // Blocking threads are shared between pools.
                claim_thread(0);
            })
            .await;
            if let Err(err) = joined {
                error!(error = %err, "bounded pool task failed");
            }
        });
    }
}

struct Job {
    priority: i32,
    seq: u64,
    work: Work,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier submission.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Queue {
    jobs: BinaryHeap<Job>,
    seq: u64,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Fixed set of std threads draining a priority queue.
pub(crate) struct StdPriorityPool {
    name: String,
    owner: u64,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl StdPriorityPool {
    pub(crate) fn new(name: &str, threads: usize) -> io::Result<Self> {
        let owner = next_owner_id();
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let shared = Arc::clone(&shared);
            let thread_name = format!("{name}-{index}");
            let worker = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    claim_thread(owner);
                    while let Some(job) = next_job(&shared) {
                        run_isolated(&thread_name, job.work);
                    }
                })?;
            workers.push(worker);
        }

        Ok(Self {
            name: name.to_owned(),
            owner,
            shared,
            workers,
        })
    }
}

/// Block for the next job; `None` once shut down and drained.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut queue = shared.queue.lock();
    loop {
        if let Some(job) = queue.jobs.pop() {
            return Some(job);
        }
        if queue.shutdown {
            return None;
        }
        shared.available.wait(&mut queue);
    }
}

impl Publisher for StdPriorityPool {
    fn publish(&self, work: Work) {
        self.submit(0, work);
    }
}

impl PriorityPool for StdPriorityPool {
    fn submit(&self, priority: i32, work: Work) {
        if owns_current_thread(self.owner) {
            work();
            return;
        }
        let mut queue = self.shared.queue.lock();
        queue.seq += 1;
        let seq = queue.seq;
        queue.jobs.push(Job { priority, seq, work });
        self.shared.available.notify_one();
    }
}

impl Drop for StdPriorityPool {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.available.notify_all();
        if owns_current_thread(self.owner) {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!(pool = %self.name, "pool worker panicked");
            }
        }
    }
}
