//! Domain Logic
//!
//! A [`Spec`] is the pluggable brain of a schema. The engine knows nothing
//! about what an Action means; it asks its [`Spec`].
//!
//! # Applying
//!
//! [`Spec::apply`] is the only way Actions change the Space. It may imprint
//! as many Things as it likes and may consult the remote when an effect
//! cannot be computed locally. Whatever it manages to do must leave the
//! Space consistent, even if it then fails.
//!
//! # Deriving
//!
//! [`Derive`] covers computed state:
//!
//! - [`Derive::derive`] builds a Thing the Space does not know yet purely
//!   from Things it does know.
//! - [`Derive::reactions`] inspects a [`Diff`] and marks, in
//!   [`Reactions`], which fields of which types or Things need
//!   recomputing.
//! - [`Derive::rederive`] recomputes those fields on one Thing. The only
//!   change it may make outside the Thing's own fields is pointing a
//!   reference at a different identifiable Thing.

mod error;
mod reactions;

pub use error::{Applied, ApplyError};
pub use reactions::{FieldSet, Reactions};

use crate::engine::RemoteSource;
use crate::model::{Action, Registry, Thing};
use crate::space::{Diff, KeyResolver, Resolver, Selector, Space};

/// Computed-state hooks for a schema. Every method defaults to "nothing to
/// derive".
pub trait Derive<T: Thing>: Send + Sync {
    /// Construct `thing` from other Things already known, if possible.
    fn derive(&self, _thing: &T, _selector: &dyn Selector<T>) -> Option<T> {
        None
    }

    /// Mark what `diff` makes stale.
    fn reactions(&self, _diff: &Diff<T>, _reactions: &mut Reactions) {}

    /// Recompute `fields` of `thing`, or every derived field when `fields`
    /// is [`FieldSet::All`]. Returns `None` when nothing changed.
    fn rederive(
        &self,
        _thing: &T,
        _fields: &FieldSet,
        _diff: &Diff<T>,
        _selector: &dyn Selector<T>,
    ) -> Option<T> {
        None
    }
}

/// A schema without derived state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDerive;

impl<T: Thing> Derive<T> for NoDerive {}

/// Domain logic for one schema.
pub trait Spec: Send + Sync + 'static {
    type Thing: Thing;
    type Action: Action;

    /// Factories for the schema's Things.
    fn things(&self) -> &Registry<Self::Thing>;

    /// Factories for the schema's Actions.
    fn actions(&self) -> &Registry<Self::Action>;

    /// Apply `action`'s effects to `space`.
    fn apply(
        &self,
        action: &Self::Action,
        space: &mut Space<Self::Thing>,
        remote: Option<&dyn RemoteSource<Self::Thing, Self::Action>>,
    ) -> Result<Applied, ApplyError>;

    /// Derived-state hooks.
    fn derive(&self) -> &dyn Derive<Self::Thing> {
        &NoDerive
    }

    /// Identity resolution for remote results.
    fn resolver(&self) -> &dyn Resolver<Self::Thing> {
        &KeyResolver
    }
}
