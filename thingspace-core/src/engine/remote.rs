//! The remote boundary.

use crate::pending::PendingResult;
use crate::result::{SyncException, SyncResult};

/// Pending outcome of a sync.
pub type SyncPending<T, A> = PendingResult<SyncResult<T, A>, SyncException<T, A>>;

/// A server (or any other authority) Actions are sent to and Things are
/// read from.
///
/// Implementations resolve the returned result from whatever thread they
/// like; the engine moves the continuation back onto its own thread. The
/// returned [`SyncResult`] lists the submitted actions in order.
pub trait RemoteSource<T, A>: Send + Sync {
    /// Send `actions`, then read `thing` if one is given.
    fn sync(&self, thing: Option<T>, actions: Vec<A>) -> SyncPending<T, A>;
}
