//! Per-item sync outcomes.

use std::error::Error;
use std::sync::Arc;
use tracing::warn;

use super::status::Status;

/// An underlying error, shareable across threads and clones.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// Outcome of one submitted item.
#[derive(Debug, Clone, Default)]
pub struct ItemResult {
    pub status: Status,
    pub cause: Option<Cause>,
    /// Human-readable detail. Never holds field values.
    pub message: Option<String>,
}

impl ItemResult {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            cause: None,
            message: None,
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<Status> for ItemResult {
    fn from(status: Status) -> Self {
        Self::new(status)
    }
}

/// The outcome of one sync: a status for every submitted Action and one
/// for the requested Thing.
#[derive(Debug, Clone)]
pub struct SyncResult<T, A> {
    thing: Option<T>,
    result: Option<T>,
    thing_result: ItemResult,
    actions: Vec<(A, ItemResult)>,
}

impl<T, A> SyncResult<T, A> {
    /// Start collecting statuses for a request.
    pub fn builder(thing: Option<T>, actions: Vec<A>) -> Builder<T, A> {
        Builder::new(thing, actions)
    }

    /// The Thing that was requested.
    pub fn thing(&self) -> Option<&T> {
        self.thing.as_ref()
    }

    /// The requested Thing's latest value, if it was read.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }

    pub fn thing_status(&self) -> Status {
        self.thing_result.status
    }

    pub fn thing_result(&self) -> &ItemResult {
        &self.thing_result
    }

    pub fn actions(&self) -> &[(A, ItemResult)] {
        &self.actions
    }

    pub fn action_status(&self, index: usize) -> Option<Status> {
        self.actions.get(index).map(|(_, result)| result.status)
    }

    pub fn action_statuses(&self) -> Vec<Status> {
        self.actions.iter().map(|(_, result)| result.status).collect()
    }

    /// Actions that ended in a failure status.
    pub fn failed_actions(&self) -> impl Iterator<Item = &(A, ItemResult)> {
        self.actions
            .iter()
            .filter(|(_, result)| result.status.is_failure())
    }

    /// Actions the caller may resubmit.
    pub fn retryable_actions(&self) -> impl Iterator<Item = &A> {
        self.actions
            .iter()
            .filter(|(_, result)| result.status.is_retryable())
            .map(|(action, _)| action)
    }

    pub fn has_failures(&self) -> bool {
        self.thing_result.status.is_failure() || self.failed_actions().next().is_some()
    }

    /// Every action ok, and the Thing ok if one was requested.
    pub fn is_success(&self) -> bool {
        self.actions.iter().all(|(_, result)| result.status.is_ok())
            && (self.thing.is_none() || self.thing_result.status.is_ok())
    }
}

/// Accumulates statuses while a sync runs.
#[derive(Debug)]
pub struct Builder<T, A> {
    thing: Option<T>,
    result: Option<T>,
    thing_result: Option<ItemResult>,
    actions: Vec<A>,
    statuses: Vec<Option<ItemResult>>,
}

impl<T, A> Builder<T, A> {
    pub fn new(thing: Option<T>, actions: Vec<A>) -> Self {
        let statuses = vec![None; actions.len()];
        Self {
            thing,
            result: None,
            thing_result: None,
            actions,
            statuses,
        }
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn requested(&self) -> Option<&T> {
        self.thing.as_ref()
    }

    /// Set an action's status.
    pub fn action(&mut self, index: usize, status: Status) -> &mut Self {
        self.action_with(index, ItemResult::new(status))
    }

    /// Set an action's full outcome. Out of range indexes are ignored.
    pub fn action_with(&mut self, index: usize, result: ItemResult) -> &mut Self {
        match self.statuses.get_mut(index) {
            Some(slot) => *slot = Some(result),
            None => warn!(index, count = self.actions.len(), "status for unknown action index"),
        }
        self
    }

    /// The status set so far for an action.
    pub fn action_status(&self, index: usize) -> Option<Status> {
        self.statuses
            .get(index)
            .and_then(|slot| slot.as_ref().map(|result| result.status))
    }

    pub fn thing(&mut self, status: Status) -> &mut Self {
        self.thing_with(ItemResult::new(status))
    }

    pub fn thing_with(&mut self, result: ItemResult) -> &mut Self {
        self.thing_result = Some(result);
        self
    }

    pub fn thing_status(&self) -> Option<Status> {
        self.thing_result.as_ref().map(|result| result.status)
    }

    /// Record the Thing's latest value.
    pub fn result(&mut self, value: T) -> &mut Self {
        self.result = Some(value);
        self
    }

    /// Whether any action or the Thing already failed.
    pub fn has_failures(&self) -> bool {
        self.statuses
            .iter()
            .chain(std::iter::once(&self.thing_result))
            .flatten()
            .any(|result| result.status.is_failure())
    }

    /// Whether any action already failed.
    pub fn has_action_failures(&self) -> bool {
        self.statuses
            .iter()
            .flatten()
            .any(|result| result.status.is_failure())
    }

    /// Finish, giving every item without a status `default`.
    ///
    /// The Thing's status is back-filled the same way when a Thing was
    /// requested; with no Thing it stays `NotAttempted`.
    pub fn build(self, default: Status) -> SyncResult<T, A> {
        let thing_result = match (self.thing_result, self.thing.is_some()) {
            (Some(result), _) => result,
            (None, true) => ItemResult::new(default),
            (None, false) => ItemResult::new(Status::NotAttempted),
        };
        let actions = self
            .actions
            .into_iter()
            .zip(self.statuses)
            .map(|(action, result)| (action, result.unwrap_or_else(|| ItemResult::new(default))))
            .collect();
        SyncResult {
            thing: self.thing,
            result: self.result,
            thing_result,
            actions,
        }
    }
}
