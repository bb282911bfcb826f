//! Subscription filters.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::model::{Thing, ThingKey};
use crate::space::Change;

type Matcher<T> = Arc<dyn Fn(Option<&T>, &T) -> bool + Send + Sync>;

/// What a subscription follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Identity(ThingKey),
    Type(&'static str),
}

/// A filter over Space changes.
pub struct Changes<T> {
    target: Target,
    matcher: Option<Matcher<T>>,
}

impl<T> Clone for Changes<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            matcher: self.matcher.clone(),
        }
    }
}

impl<T: Thing> Changes<T> {
    /// Follow `thing`'s identity. `None` if it has none.
    pub fn of(thing: &T) -> Option<Self> {
        thing.key().map(Self::of_key)
    }

    pub fn of_key(key: ThingKey) -> Self {
        Self {
            target: Target::Identity(key),
            matcher: None,
        }
    }

    /// Follow every Thing of type `kind`.
    pub fn of_type(kind: &'static str) -> Self {
        Self {
            target: Target::Type(kind),
            matcher: None,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The identity followed, if any.
    pub fn key(&self) -> Option<&ThingKey> {
        match &self.target {
            Target::Identity(key) => Some(key),
            Target::Type(_) => None,
        }
    }

    /// Only fire when `matcher(before, after)` holds. Combines with any
    /// previous refinement.
    pub fn when<F>(mut self, matcher: F) -> Self
    where
        F: Fn(Option<&T>, &T) -> bool + Send + Sync + 'static,
    {
        self.matcher = Some(match self.matcher.take() {
            None => Arc::new(matcher),
            Some(previous) => Arc::new(move |before, after| {
                previous(before, after) && matcher(before, after)
            }),
        });
        self
    }

    /// Only fire when `accessor` yields different values before and after.
    ///
    /// An accessor that panics counts as yielding no value.
    pub fn value<V, F>(self, accessor: F) -> Self
    where
        V: PartialEq,
        F: Fn(&T) -> Option<V> + Send + Sync + 'static,
    {
        self.when(move |before, after| {
            let read = |thing: &T| {
                panic::catch_unwind(AssertUnwindSafe(|| accessor(thing)))
                    .ok()
                    .flatten()
            };
            before.and_then(read) != read(after)
        })
    }

    /// Whether the change recorded for `key` is of interest.
    pub fn matches(&self, key: &ThingKey, change: &Change<T>) -> bool {
        let targeted = match &self.target {
            Target::Identity(target) => target == key,
            Target::Type(kind) => change.after.type_name() == *kind,
        };
        targeted
            && self
                .matcher
                .as_ref()
                .map_or(true, |matcher| matcher(change.before.as_ref(), &change.after))
    }
}

impl<T> fmt::Debug for Changes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changes")
            .field("target", &self.target)
            .field("refined", &self.matcher.is_some())
            .finish()
    }
}
