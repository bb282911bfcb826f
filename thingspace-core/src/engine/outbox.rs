//! Actions waiting for the remote.

use std::collections::VecDeque;
use tracing::warn;

use crate::model::Action;
use crate::result::{Status, SyncResult};

#[derive(Debug, Clone)]
pub(crate) struct Queued<A> {
    pub(crate) action: A,
    pub(crate) attempts: u32,
}

impl<A> Queued<A> {
    pub(crate) fn new(action: A) -> Self {
        Self { action, attempts: 0 }
    }
}

#[derive(Debug)]
pub(crate) struct Outbox<A> {
    queue: VecDeque<Queued<A>>,
    retry_limit: u32,
}

impl<A: Action> Outbox<A> {
    pub(crate) fn new(retry_limit: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            retry_limit,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Queue `action` for the next flush. Actions carrying credentials are
    /// refused.
    pub(crate) fn push(&mut self, action: A) -> bool {
        if action.has_credentials() {
            warn!(action = action.name(), "not queueing an action that carries credentials");
            return false;
        }
        self.queue.push_back(Queued::new(action));
        true
    }

    pub(crate) fn drain(&mut self) -> Vec<Queued<A>> {
        self.queue.drain(..).collect()
    }

    /// Put an unsent batch back in front, in its original order.
    pub(crate) fn restore(&mut self, batch: Vec<Queued<A>>) {
        for queued in batch.into_iter().rev() {
            self.queue.push_front(queued);
        }
    }

    /// Requeue whatever in a sent `batch` may be retried, given the
    /// remote's `result`. With `call_failed`, items the remote never got to
    /// count as retryable. Returns how many were requeued.
    pub(crate) fn settle<T>(
        &mut self,
        batch: Vec<Queued<A>>,
        result: &SyncResult<T, A>,
        call_failed: bool,
    ) -> usize {
        let mut requeued = 0;
        for (index, mut queued) in batch.into_iter().enumerate() {
            let status = result.action_status(index).unwrap_or_default();
            let retry = status.is_retryable() || (call_failed && status == Status::NotAttempted);
            if !retry {
                continue;
            }
            let name = queued.action.name();
            if queued.action.has_credentials() {
                warn!(action = name, "not retrying an action that carries credentials");
                continue;
            }
            queued.attempts += 1;
            if queued.attempts >= self.retry_limit {
                warn!(action = name, attempts = queued.attempts, "giving up on action");
                continue;
            }
            self.queue.push_back(queued);
            requeued += 1;
        }
        requeued
    }
}
