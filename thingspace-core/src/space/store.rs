//! The Space store: imprinting, lookup and retention.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::diff::Diff;
use super::holder::{Holder, HolderId, HolderPriority};
use crate::model::{Thing, ThingKey};

/// How many times one parent may be rebuilt while propagating a single
/// imprint. Only reachable when embedded keys form a cycle.
const MAX_REFRESHES: usize = 8;

/// Space tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Unretained Things kept cached after a trim.
    pub capacity: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    #[error("cannot imprint a {kind} without identity")]
    Unidentified { kind: &'static str },
}

/// Read-only access to Things, handed to domain logic and resolvers.
pub trait Selector<T: Thing> {
    /// Look a Thing up by identity.
    fn select(&self, key: &ThingKey) -> Option<&T>;

    /// Every Thing matching `predicate`.
    fn select_where(&self, predicate: &mut dyn FnMut(&T) -> bool) -> Vec<&T>;

    /// The stored version of `thing`, if it is identifiable and known.
    fn select_thing(&self, thing: &T) -> Option<&T> {
        thing.key().and_then(|key| self.select(&key))
    }
}

/// When and by whom a Thing last lost its retention.
#[derive(Debug, Clone, Copy)]
struct Release {
    priority: HolderPriority,
    at: u64,
}

#[derive(Debug)]
struct Held {
    holder: Holder,
    keys: IndexSet<ThingKey>,
}

/// The authoritative graph of known Things. See the [module docs](super).
#[derive(Debug)]
pub struct Space<T> {
    config: SpaceConfig,
    things: IndexMap<ThingKey, T>,
    /// Nearest identifiable descendants of each stored Thing.
    children: HashMap<ThingKey, Vec<ThingKey>>,
    /// Reverse of `children`.
    parents: HashMap<ThingKey, HashSet<ThingKey>>,
    holders: HashMap<HolderId, Held>,
    released: HashMap<ThingKey, Release>,
    touched: HashMap<ThingKey, u64>,
    clock: u64,
    /// Everything changed since the last `take_changes`.
    journal: Diff<T>,
}

impl<T: Thing> Default for Space<T> {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl<T: Thing> Space<T> {
    pub fn new(config: SpaceConfig) -> Self {
        Self {
            config,
            things: IndexMap::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
            holders: HashMap::new(),
            released: HashMap::new(),
            touched: HashMap::new(),
            clock: 0,
            journal: Diff::new(),
        }
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    pub fn get(&self, key: &ThingKey) -> Option<&T> {
        self.things.get(key)
    }

    pub fn contains(&self, key: &ThingKey) -> bool {
        self.things.contains_key(key)
    }

    /// All stored Things, oldest first.
    pub fn things(&self) -> impl Iterator<Item = &T> {
        self.things.values()
    }

    pub fn of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a T> + 'a {
        self.things
            .iter()
            .filter(move |(key, _)| key.kind() == kind)
            .map(|(_, thing)| thing)
    }

    /// The first stored Thing matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.things.values().find(|thing| predicate(thing))
    }

    // ------------------------------------------------------------------
    // Imprinting
    // ------------------------------------------------------------------

    /// Merge `thing` and everything nested in it.
    ///
    /// Returns the Things whose value changed. Re-imprinting a Thing that
    /// is already known with the same values yields an empty diff.
    pub fn imprint(&mut self, thing: &T) -> Result<Diff<T>, SpaceError> {
        if thing.key().is_none() {
            return Err(SpaceError::Unidentified {
                kind: thing.type_name(),
            });
        }

        let mut diff = Diff::new();
        let mut changed = Vec::new();
        self.imprint_node(thing, &mut diff, &mut changed);
        self.propagate(changed, &mut diff);

        trace!(changed = diff.len(), size = self.things.len(), "imprint");
        Ok(diff)
    }

    /// Imprint several Things, returning the combined diff.
    pub fn imprint_all<'a, I>(&mut self, things: I) -> Result<Diff<T>, SpaceError>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut diff = Diff::new();
        for thing in things {
            diff.absorb(self.imprint(thing)?);
        }
        Ok(diff)
    }

    fn imprint_node(&mut self, thing: &T, diff: &mut Diff<T>, changed: &mut Vec<ThingKey>) {
        thing.subthings(&mut |child| self.imprint_node(child, diff, changed));

        let Some(key) = thing.key() else {
            return;
        };
        let incoming = self.refresh(thing).unwrap_or_else(|| thing.clone());
        let merged = match self.things.get(&key) {
            Some(existing) => existing.merge(&incoming),
            None => incoming,
        };
        if self.store(key.clone(), merged, diff) {
            changed.push(key);
        }
    }

    /// `thing` with every embedded identifiable Thing swapped for its
    /// stored version. `None` if already up to date.
    fn refresh(&self, thing: &T) -> Option<T> {
        thing.map_children(&mut |child| match child.key() {
            Some(key) => self
                .things
                .get(&key)
                .filter(|latest| *latest != child)
                .cloned(),
            None => self.refresh(child),
        })
    }

    /// Rebuild parents of every changed Thing until nothing else changes.
    fn propagate(&mut self, changed: Vec<ThingKey>, diff: &mut Diff<T>) {
        let mut queue: VecDeque<ThingKey> = changed.into();
        let mut refreshes: HashMap<ThingKey, usize> = HashMap::new();

        while let Some(key) = queue.pop_front() {
            let parents: Vec<ThingKey> = match self.parents.get(&key) {
                Some(parents) => parents.iter().cloned().collect(),
                None => continue,
            };
            for parent_key in parents {
                let count = refreshes.entry(parent_key.clone()).or_default();
                if *count >= MAX_REFRESHES {
                    warn!(thing = %parent_key, "embedded references form a cycle; stopped refreshing");
                    continue;
                }
                *count += 1;

                let updated = match self.things.get(&parent_key) {
                    Some(parent) => self.refresh(parent),
                    None => None,
                };
                if let Some(updated) = updated {
                    if self.store(parent_key.clone(), updated, diff) {
                        queue.push_back(parent_key);
                    }
                }
            }
        }
    }

    fn store(&mut self, key: ThingKey, value: T, diff: &mut Diff<T>) -> bool {
        if self.things.get(&key) == Some(&value) {
            return false;
        }

        let children: Vec<ThingKey> = value
            .child_keys()
            .into_iter()
            .filter(|child| *child != key)
            .collect();
        self.unlink_children(&key);
        for child in &children {
            self.parents
                .entry(child.clone())
                .or_default()
                .insert(key.clone());
        }
        self.children.insert(key.clone(), children);

        self.clock += 1;
        self.touched.insert(key.clone(), self.clock);

        let before = self.things.insert(key.clone(), value.clone());
        diff.record(key.clone(), before.clone(), value.clone());
        self.journal.record(key, before, value);
        true
    }

    fn unlink_children(&mut self, key: &ThingKey) {
        if let Some(old) = self.children.remove(key) {
            for child in old {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.remove(key);
                    if parents.is_empty() {
                        self.parents.remove(&child);
                    }
                }
            }
        }
    }

    /// Everything that changed since the previous call, across all
    /// imprints.
    pub fn take_changes(&mut self) -> Diff<T> {
        self.journal.take()
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Retain `things` under `holder`. Unidentifiable Things are ignored.
    pub fn remember<'a, I>(&mut self, holder: &Holder, things: I)
    where
        I: IntoIterator<Item = &'a T>,
    {
        self.remember_keys(holder, things.into_iter().filter_map(|thing| thing.key()));
    }

    pub fn remember_keys<I>(&mut self, holder: &Holder, keys: I)
    where
        I: IntoIterator<Item = ThingKey>,
    {
        let held = self.holders.entry(holder.id()).or_insert_with(|| Held {
            holder: holder.clone(),
            keys: IndexSet::new(),
        });
        for key in keys {
            self.released.remove(&key);
            held.keys.insert(key);
        }
    }

    /// Release `things` from `holder`, then trim.
    pub fn forget<'a, I>(&mut self, holder: &Holder, things: I)
    where
        I: IntoIterator<Item = &'a T>,
    {
        self.forget_keys(holder, things.into_iter().filter_map(|thing| thing.key()));
    }

    pub fn forget_keys<I>(&mut self, holder: &Holder, keys: I)
    where
        I: IntoIterator<Item = ThingKey>,
    {
        let Some(held) = self.holders.get_mut(&holder.id()) else {
            return;
        };
        let mut dropped = Vec::new();
        for key in keys {
            if held.keys.shift_remove(&key) {
                dropped.push(key);
            }
        }
        if held.keys.is_empty() {
            self.holders.remove(&holder.id());
        }
        self.release(holder.priority(), dropped);
        self.trim();
    }

    /// Release everything `holder` retains, then trim.
    pub fn forget_all(&mut self, holder: &Holder) {
        if let Some(held) = self.holders.remove(&holder.id()) {
            self.release(holder.priority(), held.keys.into_iter().collect());
            self.trim();
        }
    }

    fn release(&mut self, priority: HolderPriority, dropped: Vec<ThingKey>) {
        if dropped.is_empty() {
            return;
        }
        let retained = self.retained_set();
        self.clock += 1;
        let at = self.clock;
        for key in dropped {
            // The released Thing and whatever it alone kept alive.
            let mut stack = vec![key];
            while let Some(key) = stack.pop() {
                if retained.contains(&key) || self.released.contains_key(&key) {
                    continue;
                }
                self.released.insert(key.clone(), Release { priority, at });
                if let Some(children) = self.children.get(&key) {
                    stack.extend(children.iter().cloned());
                }
            }
        }
    }

    /// Whether `holder` itself remembers `key`.
    pub fn is_held_by(&self, holder: &Holder, key: &ThingKey) -> bool {
        self.holders
            .get(&holder.id())
            .is_some_and(|held| held.keys.contains(key))
    }

    /// Holders directly remembering `key`.
    pub fn holders_of(&self, key: &ThingKey) -> Vec<&Holder> {
        self.holders
            .values()
            .filter(|held| held.keys.contains(key))
            .map(|held| &held.holder)
            .collect()
    }

    /// Whether anything keeps `key` from eviction.
    pub fn is_retained(&self, key: &ThingKey) -> bool {
        self.retained_set().contains(key)
    }

    /// Every key remembered by a holder, plus everything those Things
    /// embed.
    fn retained_set(&self) -> HashSet<ThingKey> {
        let mut retained = HashSet::new();
        let mut stack: Vec<&ThingKey> = self
            .holders
            .values()
            .flat_map(|held| held.keys.iter())
            .collect();
        while let Some(key) = stack.pop() {
            if !retained.insert(key.clone()) {
                continue;
            }
            if let Some(children) = self.children.get(key) {
                stack.extend(children.iter());
            }
        }
        retained
    }

    /// Evict unretained Things beyond the configured capacity.
    ///
    /// Lowest release priority goes first, then the longest released (or
    /// least recently imprinted). Returns the evicted keys.
    pub fn trim(&mut self) -> Vec<ThingKey> {
        let retained = self.retained_set();
        let mut candidates: Vec<(HolderPriority, u64, ThingKey)> = self
            .things
            .keys()
            .filter(|key| !retained.contains(*key))
            .map(|key| {
                let touched = self.touched.get(key).copied().unwrap_or_default();
                match self.released.get(key) {
                    Some(release) => (release.priority, release.at.max(touched), key.clone()),
                    None => (HolderPriority::Low, touched, key.clone()),
                }
            })
            .collect();

        if candidates.len() <= self.config.capacity {
            return Vec::new();
        }
        candidates.sort();
        let excess = candidates.len() - self.config.capacity;

        let evicted: Vec<ThingKey> = candidates
            .into_iter()
            .take(excess)
            .map(|(_, _, key)| key)
            .collect();
        for key in &evicted {
            self.things.shift_remove(key);
            self.unlink_children(key);
            self.released.remove(key);
            self.touched.remove(key);
        }
        debug!(evicted = evicted.len(), remaining = self.things.len(), "trimmed space");
        evicted
    }
}

impl<T: Thing> Selector<T> for Space<T> {
    fn select(&self, key: &ThingKey) -> Option<&T> {
        self.things.get(key)
    }

    fn select_where(&self, predicate: &mut dyn FnMut(&T) -> bool) -> Vec<&T> {
        self.things.values().filter(|thing| predicate(thing)).collect()
    }
}
