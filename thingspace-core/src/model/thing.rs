//! The Thing contract.

use std::fmt;

use super::registry::Variant;

/// The identity of a Thing inside a [`Space`](crate::space::Space).
///
/// Two Things with equal keys are two snapshots of the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThingKey {
    kind: &'static str,
    id: String,
}

impl ThingKey {
    /// Build a key from a type name and the canonical form of its identity
    /// fields.
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// The schema type name.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The canonical identity value.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ThingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An immutable snapshot of a domain entity.
///
/// Implemented by a schema's closed enum of variants. Equality is
/// structural over all fields.
pub trait Thing: Variant + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The schema type name. Defaults to the variant tag.
    fn type_name(&self) -> &'static str {
        self.variant()
    }

    /// The identity key, or `None` when identity fields are missing (or the
    /// type has no identity at all).
    fn key(&self) -> Option<ThingKey>;

    /// A copy holding only the identity fields.
    fn identity(&self) -> Self;

    /// Merge a newer snapshot of the same entity into this one.
    ///
    /// Fields declared on `newer` win; fields `newer` leaves unset keep
    /// their current value.
    fn merge(&self, newer: &Self) -> Self;

    /// Visit each direct child Thing (nested fields and collection
    /// elements). Does not recurse.
    fn subthings(&self, visitor: &mut dyn FnMut(&Self));

    /// Rebuild this Thing with children transformed by `f`.
    ///
    /// `f` returns `Some(replacement)` for a child that should change and
    /// `None` to keep it. Returns `None` if no child changed, so callers can
    /// skip the copy.
    fn map_children(&self, f: &mut dyn FnMut(&Self) -> Option<Self>) -> Option<Self>;

    /// Whether this Thing has identity.
    fn is_identifiable(&self) -> bool {
        self.key().is_some()
    }

    /// Deep copy-on-write replace: every nested Thing matching `predicate`
    /// is swapped for `replacement`. Returns `None` when nothing matched.
    fn with(&self, predicate: &dyn Fn(&Self) -> bool, replacement: &Self) -> Option<Self> {
        self.map_children(&mut |child| {
            if predicate(child) {
                (child != replacement).then(|| replacement.clone())
            } else {
                child.with(predicate, replacement)
            }
        })
    }

    /// Collect the keys of the nearest identifiable descendants, looking
    /// through unidentifiable intermediate Things.
    fn child_keys(&self) -> Vec<ThingKey> {
        let mut keys = Vec::new();
        self.subthings(&mut |child| match child.key() {
            Some(key) => keys.push(key),
            None => keys.extend(child.child_keys()),
        });
        keys
    }
}
