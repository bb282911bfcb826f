//! Change records produced by imprinting.

use indexmap::IndexMap;

use crate::model::{Thing, ThingKey};

/// One Thing's transition during an imprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    /// The value before the imprint, `None` if the Thing was new.
    pub before: Option<T>,
    /// The authoritative value after the imprint.
    pub after: T,
}

/// The Things whose value changed during one or more imprints, in the
/// order they first changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<T> {
    changes: IndexMap<ThingKey, Change<T>>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            changes: IndexMap::new(),
        }
    }
}

impl<T: Thing> Diff<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, key: &ThingKey) -> bool {
        self.changes.contains_key(key)
    }

    /// The latest value of a changed Thing.
    pub fn get(&self, key: &ThingKey) -> Option<&T> {
        self.changes.get(key).map(|change| &change.after)
    }

    pub fn change(&self, key: &ThingKey) -> Option<&Change<T>> {
        self.changes.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ThingKey> {
        self.changes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ThingKey, &Change<T>)> {
        self.changes.iter()
    }

    /// Latest values of every changed Thing.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.changes.values().map(|change| &change.after)
    }

    /// Latest values of changed Things of one type.
    pub fn of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a T> + 'a {
        self.changes
            .iter()
            .filter(move |(key, _)| key.kind() == kind)
            .map(|(_, change)| &change.after)
    }

    /// Record a transition. An existing entry keeps its original `before`
    /// and takes the new `after`; an entry that ends up back where it
    /// started is dropped.
    pub(crate) fn record(&mut self, key: ThingKey, before: Option<T>, after: T) {
        match self.changes.get_mut(&key) {
            Some(change) => {
                if change.before.as_ref() == Some(&after) {
                    self.changes.shift_remove(&key);
                } else {
                    change.after = after;
                }
            }
            None => {
                self.changes.insert(key, Change { before, after });
            }
        }
    }

    /// Fold a later diff into this one.
    pub fn absorb(&mut self, later: Diff<T>) {
        for (key, change) in later.changes {
            self.record(key, change.before, change.after);
        }
    }

    /// Remove and return everything recorded so far.
    pub(crate) fn take(&mut self) -> Diff<T> {
        std::mem::take(self)
    }
}

impl<'a, T> IntoIterator for &'a Diff<T> {
    type Item = (&'a ThingKey, &'a Change<T>);
    type IntoIter = indexmap::map::Iter<'a, ThingKey, Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
