//! Sync failure wrapper.

use std::error::Error;
use std::fmt;

use super::status::Phase;
use super::sync_result::{Cause, SyncResult};
use crate::model::{Action, Thing};

/// A failed sync: which phase failed, plus the complete per-item result.
///
/// `Display` and `Debug` list action names, Thing types and statuses only;
/// field values never appear.
#[derive(Clone)]
pub struct SyncException<T, A> {
    result: SyncResult<T, A>,
    phase: Phase,
    cause: Option<Cause>,
    message: Option<String>,
}

impl<T, A> SyncException<T, A> {
    pub fn new(result: SyncResult<T, A>, phase: Phase) -> Self {
        Self {
            result,
            phase,
            cause: None,
            message: None,
        }
    }

    /// Pick the phase from the result: a failed action means `Actions`, a
    /// failed Thing means `Thing`, anything else `Setup`.
    pub fn from_result(result: SyncResult<T, A>) -> Self {
        let phase = if result.failed_actions().next().is_some() {
            Phase::Actions
        } else if result.thing_status().is_failure() {
            Phase::Thing
        } else {
            Phase::Setup
        };
        Self::new(result, phase)
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> &SyncResult<T, A> {
        &self.result
    }

    pub fn into_result(self) -> SyncResult<T, A> {
        self.result
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The most specific underlying error: the deepest `source()` of the
    /// direct cause, or of the first failed item's cause.
    pub fn root_cause(&self) -> Option<&(dyn Error + 'static)> {
        let start: &(dyn Error + Send + Sync + 'static) = match &self.cause {
            Some(cause) => &**cause,
            None => self
                .result
                .failed_actions()
                .map(|(_, item)| item)
                .chain(std::iter::once(self.result.thing_result()))
                .find_map(|item| item.cause.as_deref())?,
        };
        let mut current: &(dyn Error + 'static) = start;
        while let Some(next) = current.source() {
            current = next;
        }
        Some(current)
    }
}

impl<T: Thing, A: Action> SyncException<T, A> {
    fn summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = self.result.actions();
        if !actions.is_empty() {
            f.write_str(" [actions:")?;
            for (index, (action, item)) in actions.iter().enumerate() {
                let sep = if index == 0 { " " } else { ", " };
                write!(f, "{sep}{}={}", action.name(), item.status)?;
            }
            f.write_str("]")?;
        }
        if let Some(thing) = self.result.thing() {
            write!(f, " [thing: {}={}]", thing.type_name(), self.result.thing_status())?;
        }
        Ok(())
    }
}

impl<T: Thing, A: Action> fmt::Display for SyncException<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync failed in {} phase", self.phase)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        self.summary(f)?;
        if let Some(root) = self.root_cause() {
            write!(f, "; caused by: {root}")?;
        }
        Ok(())
    }
}

impl<T: Thing, A: Action> fmt::Debug for SyncException<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncException")
            .field("phase", &self.phase)
            .field("message", &self.message)
            .field("actions", &self.result.action_statuses())
            .field("thing", &self.result.thing_status())
            .finish()
    }
}

impl<T: Thing, A: Action> Error for SyncException<T, A> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}
