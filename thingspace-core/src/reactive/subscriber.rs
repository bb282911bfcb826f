//! Subscriber registry.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

use super::changes::Changes;
use crate::model::{Thing, ThingKey};
use crate::pending::Publisher;
use crate::space::{Diff, Holder};

/// Unique identifier for a subscriber.
///
/// Identifiers increase monotonically, so sorting by id gives registration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps subscribed identities in the Space.
///
/// Always called on the subscribers' publisher.
pub trait Retainer: Send + Sync {
    fn remember(&self, holder: &Holder, key: &ThingKey);
    fn forget(&self, holder: &Holder, key: &ThingKey);
}

struct Entry<T> {
    id: SubscriberId,
    changes: Changes<T>,
    active: Arc<AtomicBool>,
    on_update: Box<dyn Fn(&T) + Send + Sync>,
}

type Registry<T> = DashMap<SubscriberId, Arc<Entry<T>>>;

/// The set of live subscriptions for one Space.
pub struct Subscribers<T> {
    entries: Arc<Registry<T>>,
    publisher: Arc<dyn Publisher>,
    retainer: Option<Arc<dyn Retainer>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            publisher: Arc::clone(&self.publisher),
            retainer: self.retainer.clone(),
        }
    }
}

impl<T: Thing> Subscribers<T> {
    /// `publisher` runs deferred releases; `retainer`, when present, keeps
    /// retained identities alive.
    pub fn new(publisher: Arc<dyn Publisher>, retainer: Option<Arc<dyn Retainer>>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            publisher,
            retainer,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register `on_update` for everything `changes` matches.
    ///
    /// With `retain`, an identity target is remembered under a dedicated
    /// holder until the subscription stops. Type targets have nothing to
    /// retain.
    pub fn add<F>(&self, changes: Changes<T>, retain: bool, on_update: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let active = Arc::new(AtomicBool::new(true));

        let retained = match (retain, changes.key(), &self.retainer) {
            (true, Some(key), Some(retainer)) => {
                let holder = Holder::named(format!("subscription-{}", id.raw()));
                let retainer = Arc::clone(retainer);
                let (held, remembered) = (holder.clone(), key.clone());
                let remember = Arc::clone(&retainer);
                self.publisher
                    .publish(Box::new(move || remember.remember(&held, &remembered)));
                Some((retainer, holder, key.clone()))
            }
            _ => None,
        };

        trace!(subscriber = id.raw(), filter = ?changes.target(), retain, "subscribe");
        self.entries.insert(
            id,
            Arc::new(Entry {
                id,
                changes,
                active: Arc::clone(&active),
                on_update: Box::new(on_update),
            }),
        );

        let entries: Weak<Registry<T>> = Arc::downgrade(&self.entries);
        let publisher = Arc::clone(&self.publisher);
        let cleanup = move || {
            if let Some(entries) = entries.upgrade() {
                entries.remove(&id);
            }
            if let Some((retainer, holder, key)) = retained {
                publisher.publish(Box::new(move || retainer.forget(&holder, &key)));
            }
        };

        Subscription {
            id,
            active,
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    /// Deliver `diff` to every matching subscriber. Returns the number of
    /// callbacks run.
    pub fn publish(&self, diff: &Diff<T>) -> usize {
        if diff.is_empty() {
            return 0;
        }
        let mut entries: Vec<Arc<Entry<T>>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        entries.sort_by_key(|entry| entry.id);

        let mut delivered = 0;
        for (key, change) in diff {
            for entry in &entries {
                if !entry.changes.matches(key, change) {
                    continue;
                }
                // Stopped since the snapshot was taken.
                if !entry.active.load(Ordering::Acquire) {
                    continue;
                }
                let update = AssertUnwindSafe(|| (entry.on_update)(&change.after));
                if panic::catch_unwind(update).is_err() {
                    error!(subscriber = entry.id.raw(), thing = %key, "subscriber panicked");
                } else {
                    delivered += 1;
                }
            }
        }
        debug!(changes = diff.len(), delivered, "published diff");
        delivered
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Handle to a live subscription. Stops it when dropped.
#[must_use = "dropping a Subscription stops it"]
pub struct Subscription {
    id: SubscriberId,
    active: Arc<AtomicBool>,
    cleanup: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop receiving updates. Safe to call from any thread, repeatedly.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(cleanup) = self.cleanup.lock().take() {
            cleanup();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
