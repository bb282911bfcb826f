//! Space
//!
//! The authoritative, in-memory graph of known Things.
//!
//! # Imprinting
//!
//! [`Space::imprint`] merges a Thing, and every identifiable Thing nested
//! inside it, into the graph. Children are merged before their parents so
//! a parent always embeds the latest child. When a Thing changes, every
//! stored Thing that embeds it is rebuilt through
//! [`Thing::map_children`](crate::model::Thing::map_children), transitively.
//! Everything that changed is reported in a [`Diff`].
//!
//! # Retention
//!
//! [`Holder`]s protect Things from eviction. A Thing stays retained while
//! any holder remembers it or any retained Thing embeds it. Once nothing
//! retains it, it becomes eligible for eviction; [`Space::trim`] keeps at
//! most [`SpaceConfig::capacity`] such Things cached and evicts the rest,
//! lowest release priority first.
//!
//! # Threading
//!
//! Space does no locking. Mutation takes `&mut self`, so reads through a
//! [`Selector`] can never observe a half-finished imprint. Callers that
//! share a Space must serialize access themselves, typically by funneling
//! every mutation through one dedicated thread.

mod diff;
mod holder;
mod resolver;
mod store;

pub use diff::{Change, Diff};
pub use holder::{Holder, HolderId, HolderPriority};
pub use resolver::{resolve_all, KeyResolver, Resolver};
pub use store::{Selector, Space, SpaceConfig, SpaceError};
