//! Single-resolution results.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

use super::publisher::{ImmediatePublisher, Publisher};

enum Outcome<T, E> {
    Pending,
    Success(T),
    Failure(E),
}

impl<T: Clone, E: Clone> Outcome<T, E> {
    fn snapshot(&self) -> Option<Result<T, E>> {
        match self {
            Outcome::Pending => None,
            Outcome::Success(value) => Some(Ok(value.clone())),
            Outcome::Failure(error) => Some(Err(error.clone())),
        }
    }
}

enum Callback<T, E> {
    Success(Box<dyn FnOnce(T) + Send>),
    Failure(Box<dyn FnOnce(E) + Send>),
    Complete(Box<dyn FnOnce() + Send>),
    Result(Box<dyn FnOnce(Result<T, E>) + Send>),
}

impl<T: Send + 'static, E: Send + 'static> Callback<T, E> {
    /// Hand the callback to `publisher` if it applies to `result`.
    fn deliver(self, publisher: &dyn Publisher, result: Result<T, E>) {
        match (self, result) {
            (Callback::Success(f), Ok(value)) => publisher.publish(Box::new(move || f(value))),
            (Callback::Failure(f), Err(error)) => publisher.publish(Box::new(move || f(error))),
            (Callback::Complete(f), _) => publisher.publish(f),
            (Callback::Result(f), result) => publisher.publish(Box::new(move || f(result))),
            _ => {}
        }
    }
}

struct State<T, E> {
    outcome: Outcome<T, E>,
    abandoned: bool,
    callbacks: Vec<Callback<T, E>>,
    publisher: Arc<dyn Publisher>,
    on_abandon: Vec<Box<dyn FnOnce() + Send>>,
}

struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    resolved: Condvar,
}

/// A result that will be resolved exactly once, to `Ok(T)` or `Err(E)`.
///
/// Clones share the same underlying result.
///
/// # Example
///
/// ```rust
/// use thingspace_core::pending::PendingResult;
///
/// let pending: PendingResult<u32, String> = PendingResult::new();
/// pending.on_success(|value| println!("got {value}"));
///
/// assert!(pending.success(7));
/// assert!(!pending.fail("too late".into()));
/// assert_eq!(pending.get(), Some(Ok(7)));
/// ```
pub struct PendingResult<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for PendingResult<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> PendingResult<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// An unresolved result delivering callbacks on the resolving thread.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    outcome: Outcome::Pending,
                    abandoned: false,
                    callbacks: Vec::new(),
                    publisher: Arc::new(ImmediatePublisher),
                    on_abandon: Vec::new(),
                }),
                resolved: Condvar::new(),
            }),
        }
    }

    /// An already successful result.
    pub fn succeeded(value: T) -> Self {
        let pending = Self::new();
        pending.success(value);
        pending
    }

    /// An already failed result.
    pub fn failed(error: E) -> Self {
        let pending = Self::new();
        pending.fail(error);
        pending
    }

    /// Resolve successfully. Returns `false` (and drops `value`) if the
    /// result was already resolved or abandoned.
    pub fn success(&self, value: T) -> bool {
        self.resolve(Outcome::Success(value))
    }

    /// Resolve with a failure. Returns `false` if the result was already
    /// resolved or abandoned.
    pub fn fail(&self, error: E) -> bool {
        self.resolve(Outcome::Failure(error))
    }

    fn resolve(&self, outcome: Outcome<T, E>) -> bool {
        let (callbacks, publisher, result) = {
            let mut state = self.inner.state.lock();
            if state.abandoned || !matches!(state.outcome, Outcome::Pending) {
                return false;
            }
            state.outcome = outcome;
            self.inner.resolved.notify_all();
            let Some(result) = state.outcome.snapshot() else {
                return false;
            };
            (
                std::mem::take(&mut state.callbacks),
                Arc::clone(&state.publisher),
                result,
            )
        };
        for callback in callbacks {
            callback.deliver(publisher.as_ref(), result.clone());
        }
        true
    }

    /// Block until resolved. Returns `None` if the result is abandoned.
    pub fn get(&self) -> Option<Result<T, E>> {
        let mut state = self.inner.state.lock();
        while matches!(state.outcome, Outcome::Pending) && !state.abandoned {
            self.inner.resolved.wait(&mut state);
        }
        if state.abandoned {
            return None;
        }
        state.outcome.snapshot()
    }

    /// The result if already resolved, without blocking.
    pub fn peek(&self) -> Option<Result<T, E>> {
        let state = self.inner.state.lock();
        if state.abandoned {
            return None;
        }
        state.outcome.snapshot()
    }

    /// Whether the result is resolved or abandoned.
    pub fn is_done(&self) -> bool {
        let state = self.inner.state.lock();
        state.abandoned || !matches!(state.outcome, Outcome::Pending)
    }

    pub fn is_abandoned(&self) -> bool {
        self.inner.state.lock().abandoned
    }

    /// Deliver future callbacks through `publisher`.
    pub fn publisher(&self, publisher: Arc<dyn Publisher>) -> &Self {
        self.inner.state.lock().publisher = publisher;
        self
    }

    fn register(&self, callback: Callback<T, E>) -> &Self {
        let (publisher, result) = {
            let mut state = self.inner.state.lock();
            if state.abandoned {
                return self;
            }
            match state.outcome.snapshot() {
                None => {
                    state.callbacks.push(callback);
                    return self;
                }
                Some(result) => (Arc::clone(&state.publisher), result),
            }
        };
        callback.deliver(publisher.as_ref(), result);
        self
    }

    /// Called once with the value if the result succeeds.
    pub fn on_success<F>(&self, f: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.register(Callback::Success(Box::new(f)))
    }

    /// Called once with the error if the result fails.
    pub fn on_failure<F>(&self, f: F) -> &Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.register(Callback::Failure(Box::new(f)))
    }

    /// Called once when the result resolves either way.
    pub fn on_complete<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Callback::Complete(Box::new(f)))
    }

    /// Called once with the outcome when the result resolves.
    pub fn on_result<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        self.register(Callback::Result(Box::new(f)))
    }

    /// Stop delivering anything. Pending callbacks are dropped, blocked
    /// [`get`](Self::get) calls return `None`, and any linked proxy is
    /// abandoned too. Running work is not interrupted.
    pub fn abandon(&self) {
        let cascade = {
            let mut state = self.inner.state.lock();
            if state.abandoned {
                return;
            }
            state.abandoned = true;
            state.callbacks.clear();
            self.inner.resolved.notify_all();
            std::mem::take(&mut state.on_abandon)
        };
        for f in cascade {
            f();
        }
    }

    /// Abandon `other` whenever this result is abandoned.
    pub fn proxy<U, F>(&self, other: &PendingResult<U, F>)
    where
        U: Clone + Send + 'static,
        F: Clone + Send + 'static,
    {
        let other = other.clone();
        {
            let mut state = self.inner.state.lock();
            if !state.abandoned {
                state.on_abandon.push(Box::new(move || other.abandon()));
                return;
            }
        }
        other.abandon();
    }
}

impl<T, E> Default for PendingResult<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for PendingResult<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        let status = match (&state.outcome, state.abandoned) {
            (_, true) => "abandoned",
            (Outcome::Pending, _) => "pending",
            (Outcome::Success(_), _) => "success",
            (Outcome::Failure(_), _) => "failure",
        };
        f.debug_struct("PendingResult").field("status", &status).finish()
    }
}
