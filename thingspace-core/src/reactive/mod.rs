//! Change Subscriptions
//!
//! Observers register interest in part of the Space with a [`Changes`]
//! filter and are called back whenever a [`Diff`](crate::space::Diff)
//! touches it.
//!
//! # Filters
//!
//! - [`Changes::of`] / [`Changes::of_key`] follow one identity.
//! - [`Changes::of_type`] follows every Thing of a type.
//! - [`Changes::value`] narrows either to a field that actually changed.
//! - [`Changes::when`] takes an arbitrary before/after predicate.
//!
//! # Delivery
//!
//! [`Subscribers::publish`] runs synchronously inside the transaction that
//! produced the diff. A panicking observer is logged and skipped; it never
//! aborts the transaction.
//!
//! # Stopping
//!
//! [`Subscription::stop`] may be called from any thread, any number of
//! times. Once it returns no further update is delivered, except for a
//! callback that had already started. Releasing retained Things is
//! deferred onto the subscribers' publisher so the Space keeps a single
//! writer. Dropping a `Subscription` stops it.

mod changes;
mod subscriber;

pub use changes::{Changes, Target};
pub use subscriber::{Retainer, SubscriberId, Subscribers, Subscription};
