//! Dispatch strategies.

use std::cell::Cell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{error, warn};

/// A unit of work handed to a [`Publisher`].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Chooses the thread that runs a piece of work.
pub trait Publisher: Send + Sync {
    /// Run `work`, now or later, on a thread of the publisher's choosing.
    ///
    /// Implementations called from a thread they own must run `work`
    /// synchronously.
    fn publish(&self, work: Work);
}

/// Runs work immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediatePublisher;

impl Publisher for ImmediatePublisher {
    fn publish(&self, work: Work) {
        work();
    }
}

thread_local! {
    /// Identifier of the publisher or pool owning the current thread, 0
    /// for none.
    static OWNER: Cell<u64> = const { Cell::new(0) };
}

/// Allocate an owner identifier for a publisher or pool.
pub(crate) fn next_owner_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Mark the current thread as owned by `owner`.
pub(crate) fn claim_thread(owner: u64) {
    OWNER.with(|cell| cell.set(owner));
}

/// Whether the current thread is owned by `owner`.
pub(crate) fn owns_current_thread(owner: u64) -> bool {
    OWNER.with(|cell| cell.get() == owner)
}

/// Run `work`, logging instead of unwinding if it panics.
pub(crate) fn run_isolated(name: &str, work: Work) {
    if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
        error!(publisher = name, "published work panicked");
    }
}

/// A publisher backed by one dedicated thread.
///
/// Work runs in exactly the order it was published. Work published from
/// the thread itself runs inline. Dropping the publisher lets queued work
/// finish, then stops the thread.
pub struct ThreadPublisher {
    name: String,
    owner: u64,
    sender: Option<mpsc::UnboundedSender<Work>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl ThreadPublisher {
    /// Spawn the thread.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let owner = next_owner_id();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Work>();

        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            claim_thread(owner);
            while let Some(work) = receiver.blocking_recv() {
                run_isolated(&thread_name, work);
            }
        })?;

        Ok(Self {
            name,
            owner,
            sender: Some(sender),
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the caller is running on this publisher's thread.
    pub fn is_current(&self) -> bool {
        owns_current_thread(self.owner)
    }
}

impl Publisher for ThreadPublisher {
    fn publish(&self, work: Work) {
        if self.is_current() {
            work();
            return;
        }
        match self.sender.as_ref() {
            Some(sender) => {
                if sender.send(work).is_err() {
                    warn!(publisher = %self.name, "publisher thread is gone; dropped work");
                }
            }
            None => warn!(publisher = %self.name, "publisher is shut down; dropped work"),
        }
    }
}

impl Drop for ThreadPublisher {
    fn drop(&mut self) {
        // Closing the channel ends the thread's loop once the queue drains.
        self.sender.take();
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(publisher = %self.name, "publisher thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPublisher")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}
