//! Identity resolution for Things crossing the remote boundary.
//!
//! Remote results often describe an entity by a secondary field (a URL, a
//! slug) without the identity fields the Space keys on. A [`Resolver`]
//! looks such Things up and fills their identity in, or reduces a Thing to
//! its identity so a partial result can be imprinted without clobbering
//! fields a later, complete result will bring.

use super::store::Selector;
use crate::model::Thing;

/// Strategy for fixing or stripping identity.
pub trait Resolver<T: Thing>: Send + Sync {
    /// Return `thing` with its identity filled in, or `None` if it cannot
    /// be resolved.
    fn resolve(&self, thing: &T, selector: &dyn Selector<T>) -> Option<T>;

    /// Project `thing` down to its identity fields.
    fn reduce(&self, thing: &T) -> T {
        thing.identity()
    }
}

/// Only accepts Things that already carry their identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyResolver;

impl<T: Thing> Resolver<T> for KeyResolver {
    fn resolve(&self, thing: &T, _selector: &dyn Selector<T>) -> Option<T> {
        thing.key().map(|_| thing.clone())
    }
}

/// Resolve `thing` and every Thing nested in it, bottom-up.
///
/// Nested Things are rewritten only where the resolver succeeds; anything
/// unresolved is kept as is. Things own their children, so the walk always
/// terminates.
pub fn resolve_all<T: Thing>(resolver: &dyn Resolver<T>, thing: &T, selector: &dyn Selector<T>) -> T {
    let current = thing
        .map_children(&mut |child| {
            let resolved = resolve_all(resolver, child, selector);
            (resolved != *child).then_some(resolved)
        })
        .unwrap_or_else(|| thing.clone());

    if current.key().is_some() {
        return current;
    }
    resolver.resolve(&current, selector).unwrap_or(current)
}
