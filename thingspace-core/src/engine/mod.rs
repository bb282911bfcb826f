//! The Local Source
//!
//! [`Engine`] ties the pieces together: it owns the Space, applies Actions
//! through the schema's [`Spec`](crate::spec::Spec), keeps derived state
//! settled, notifies subscribers and talks to an optional
//! [`RemoteSource`].
//!
//! # Threading
//!
//! Every Space mutation runs on one dedicated
//! [`ThreadPublisher`](crate::pending::ThreadPublisher) thread, in
//! submission order. Reads through [`Engine::read`] may come from any
//! thread.
//!
//! # Remote priorities
//!
//! | priority   | applied locally | reaches the remote         |
//! |------------|-----------------|----------------------------|
//! | `Local`    | yes             | never                      |
//! | `Whenever` | yes             | next [`Engine::flush`]     |
//! | `Soon`     | yes             | next [`Engine::flush`]     |
//! | `Asap`     | yes             | immediately, in background |
//! | `Remote`   | no              | immediately, awaited       |
//!
//! Background sends that fail with a retryable status go back to the
//! outbox, unless the Action carries credentials or has used up its
//! retries.

mod config;
mod local;
mod outbox;
mod remote;

pub use config::{EngineConfig, EngineError};
pub use local::Engine;
pub use remote::{RemoteSource, SyncPending};
