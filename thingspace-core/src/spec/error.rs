//! Apply outcomes.

use thiserror::Error;

use crate::result::Status;
use crate::space::SpaceError;

/// Successful application of an Action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The Action took effect.
    Done,
    /// The Action was valid but had nothing to do.
    Ignored,
}

impl Applied {
    pub fn status(self) -> Status {
        match self {
            Applied::Done => Status::Success,
            Applied::Ignored => Status::Ignored,
        }
    }
}

/// Why an Action could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    /// Could not apply now; trying again later may work.
    #[error("{action} failed: {reason}")]
    Failed { action: &'static str, reason: String },

    /// Can never be applied.
    #[error("{action} rejected: {reason}")]
    Rejected { action: &'static str, reason: String },

    /// No handler for this Action.
    #[error("{action} is not supported")]
    Unsupported { action: &'static str },

    #[error(transparent)]
    Space(#[from] SpaceError),
}

impl ApplyError {
    pub fn failed(action: &'static str, reason: impl Into<String>) -> Self {
        ApplyError::Failed {
            action,
            reason: reason.into(),
        }
    }

    pub fn rejected(action: &'static str, reason: impl Into<String>) -> Self {
        ApplyError::Rejected {
            action,
            reason: reason.into(),
        }
    }

    /// The status to report for the Action.
    pub fn status(&self) -> Status {
        match self {
            ApplyError::Failed { .. } => Status::Failed,
            ApplyError::Rejected { .. } | ApplyError::Unsupported { .. } | ApplyError::Space(_) => {
                Status::FailedDiscard
            }
        }
    }
}
