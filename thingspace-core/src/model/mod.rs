//! Domain Values
//!
//! Things and Actions are the immutable values the engine moves around.
//! A schema (usually generated) supplies one closed enum of Thing variants
//! and one of Action variants; the engine only relies on the traits here.
//!
//! # Things
//!
//! A [`Thing`] is a snapshot of a domain entity. Its *identity* is the
//! minimal subset of fields that names it, surfaced as a [`ThingKey`].
//! Things nest: a Thing may hold other Things (identifiable or not) as
//! fields, which the engine walks generically through
//! [`Thing::subthings`] and rebuilds through [`Thing::map_children`].
//!
//! # Actions
//!
//! An [`Action`] is a requested mutation. Besides its payload it carries a
//! timestamp, causal/analytics context, an auth requirement and a default
//! [`RemotePriority`].
//!
//! # Interchange
//!
//! Both kinds of value convert to and from JSON and the binary codec.
//! Dispatch by name goes through an explicit [`Registry`] instance; there
//! is no process-wide table.

mod action;
mod error;
mod json;
mod registry;
mod thing;

pub use action::{Action, ActionContext, AuthRequirement, RemotePriority};
pub use error::ParseError;
pub use json::{JsonConfig, REDACTED};
pub use registry::{Factory, Registry, Variant};
pub use thing::{Thing, ThingKey};
