//! Rederive bookkeeping.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::model::{Thing, ThingKey};

/// Which derived fields to recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSet {
    All,
    Named(SmallVec<[&'static str; 4]>),
}

impl FieldSet {
    pub fn of(fields: &[&'static str]) -> Self {
        FieldSet::Named(fields.iter().copied().collect())
    }

    pub fn contains(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Named(names) => names.contains(&field),
        }
    }

    /// The named fields, `None` for all.
    pub fn names(&self) -> Option<&[&'static str]> {
        match self {
            FieldSet::All => None,
            FieldSet::Named(names) => Some(names),
        }
    }

    fn union(&mut self, other: &FieldSet) {
        match (&mut *self, other) {
            (FieldSet::All, _) => {}
            (_, FieldSet::All) => *self = FieldSet::All,
            (FieldSet::Named(names), FieldSet::Named(more)) => {
                for field in more {
                    if !names.contains(field) {
                        names.push(field);
                    }
                }
            }
        }
    }
}

/// Fields flagged for recomputation after a Diff.
///
/// Type-level entries apply to every Thing of the type, including ones
/// imprinted after the entry was added. Thing-level entries target one
/// identity.
#[derive(Debug, Clone, Default)]
pub struct Reactions {
    types: IndexMap<&'static str, FieldSet>,
    things: IndexMap<ThingKey, FieldSet>,
}

impl Reactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.things.is_empty()
    }

    pub fn clear(&mut self) {
        self.types.clear();
        self.things.clear();
    }

    /// Recompute `fields` on every Thing of `kind`.
    pub fn react_type(&mut self, kind: &'static str, fields: FieldSet) -> &mut Self {
        Self::add(&mut self.types, kind, fields);
        self
    }

    /// Recompute `fields` on one Thing.
    pub fn react_thing(&mut self, key: ThingKey, fields: FieldSet) -> &mut Self {
        Self::add(&mut self.things, key, fields);
        self
    }

    fn add<K: std::hash::Hash + Eq>(map: &mut IndexMap<K, FieldSet>, key: K, fields: FieldSet) {
        match map.get_mut(&key) {
            Some(existing) => existing.union(&fields),
            None => {
                map.insert(key, fields);
            }
        }
    }

    /// Fold in everything `other` flags.
    pub fn absorb(&mut self, other: Reactions) {
        for (kind, fields) in other.types {
            Self::add(&mut self.types, kind, fields);
        }
        for (key, fields) in other.things {
            Self::add(&mut self.things, key, fields);
        }
    }

    /// The fields to recompute on `thing`, `None` if it is unaffected.
    pub fn fields_for<T: Thing>(&self, thing: &T) -> Option<FieldSet> {
        let by_type = self.types.get(thing.type_name());
        let by_thing = thing.key().and_then(|key| self.things.get(&key));
        match (by_type, by_thing) {
            (None, None) => None,
            (Some(fields), None) | (None, Some(fields)) => Some(fields.clone()),
            (Some(a), Some(b)) => {
                let mut fields = a.clone();
                fields.union(b);
                Some(fields)
            }
        }
    }

    /// Whether anything of `kind` could be affected.
    pub fn touches_type(&self, kind: &str) -> bool {
        self.types.contains_key(kind) || self.things.keys().any(|key| key.kind() == kind)
    }
}
