//! Thingspace Core
//!
//! This crate provides the client-side core of an offline-first sync
//! engine. Applications describe their data as identifiable *Things* and
//! their intents as *Actions*; the engine keeps a normalized in-memory
//! store of Things, applies Actions locally, keeps derived state current
//! and tells observers what changed.
//!
//! It implements:
//!
//! - A compact binary codec (varints, bit packing, containers)
//! - Thing and Action contracts with explicit JSON/binary registries
//! - The Space: a normalized, reference-counted Thing store
//! - Change subscriptions with precise filters
//! - Single-resolution async results and dispatch strategies
//! - Structured per-item sync results
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `codec`: Binary encoding primitives
//! - `model`: Thing/Action contracts, JSON config and factory registries
//! - `space`: The Space store, diffs, holders and resolvers
//! - `spec`: Pluggable domain logic and derived state
//! - `reactive`: Change filters and subscribers
//! - `pending`: `PendingResult`, publishers and thread pools
//! - `result`: `SyncResult`, `Status`, `Phase`, `SyncException`
//! - `engine`: The local source tying everything together
//!
//! # Example
//!
//! ```rust,ignore
//! use thingspace_core::engine::{Engine, EngineConfig};
//! use thingspace_core::reactive::Changes;
//!
//! let engine = Engine::local(MySpec::new(), EngineConfig::default())?;
//!
//! // Observe one item
//! let _subscription = engine.subscribe(Changes::of(&item).unwrap(), true, |item| {
//!     println!("item changed: {item:?}");
//! });
//!
//! // Apply an action and read the item back
//! let result = engine.sync(Some(item), vec![archive]).get();
//! ```

pub mod codec;
pub mod engine;
pub mod model;
pub mod pending;
pub mod reactive;
pub mod result;
pub mod space;
pub mod spec;
