//! Async Results and Dispatch
//!
//! The engine never assumes a particular threading runtime. Work that has
//! to run "somewhere" goes through a [`Publisher`], and results come back
//! as a [`PendingResult`].
//!
//! # PendingResult
//!
//! A single-assignment future: it resolves exactly once, to a success or a
//! failure. Callbacks registered before or after resolution each fire at
//! most once, delivered through the result's current publisher.
//! [`PendingResult::abandon`] suppresses delivery (and cascades to a linked
//! proxy result) but never interrupts work already running.
//!
//! # Publishers
//!
//! - [`ImmediatePublisher`] runs work on the calling thread. The default.
//! - [`ThreadPublisher`] owns one thread and runs work in strict
//!   submission order.
//!
//! A publisher asked to run work from a thread it owns runs it inline, so
//! code already on that thread never deadlocks waiting for itself.
//!
//! # Thread pools
//!
//! [`ThreadPools`] is the host's factory for bounded and priority-ordered
//! pools. [`DefaultThreadPools`] provides both on top of tokio and std
//! threads.

mod pools;
mod publisher;
mod result;

pub use pools::{DefaultThreadPools, PriorityPool, ThreadPools};
pub use publisher::{ImmediatePublisher, Publisher, ThreadPublisher, Work};
pub use result::PendingResult;
