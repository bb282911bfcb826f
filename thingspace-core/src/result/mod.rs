//! Sync Results
//!
//! Every submitted Action and the requested Thing end with their own
//! terminal [`Status`], so a partly successful sync is an ordinary value
//! rather than an error.
//!
//! # Status
//!
//! | status            | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `NotAttempted`    | never tried                               |
//! | `Success`         | done                                      |
//! | `Ignored`         | accepted but had no effect                |
//! | `Failed`          | failed, safe to retry                     |
//! | `FailedDiscard`   | failed, never resubmit                    |
//!
//! # Failures
//!
//! A [`SyncException`] wraps the full [`SyncResult`] together with the
//! [`Phase`] that failed: `Setup` (nothing attempted), `Actions` (an action
//! failed, the Thing read was skipped) or `Thing` (actions went through,
//! the read failed).

mod exception;
mod status;
mod sync_result;

pub use exception::SyncException;
pub use status::{Phase, Status};
pub use sync_result::{Builder, Cause, ItemResult, SyncResult};
