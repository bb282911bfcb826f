//! Item status and failure phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of one submitted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    NotAttempted,
    Success,
    Ignored,
    /// Failed; the caller may retry.
    Failed,
    /// Failed; the caller must not resubmit.
    FailedDiscard,
}

impl Status {
    /// Success or Ignored.
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Success | Status::Ignored)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failed | Status::FailedDiscard)
    }

    pub fn is_retryable(self) -> bool {
        self == Status::Failed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotAttempted => "NOT_ATTEMPTED",
            Status::Success => "SUCCESS",
            Status::Ignored => "IGNORED",
            Status::Failed => "FAILED",
            Status::FailedDiscard => "FAILED_DISCARD",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a sync failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Could not begin: transport, auth, configuration. Nothing attempted.
    Setup,
    /// One or more actions failed; the Thing was not read.
    Actions,
    /// Actions succeeded or were ignored; the Thing read failed.
    Thing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Setup => "SETUP",
            Phase::Actions => "ACTIONS",
            Phase::Thing => "THING",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Status::Success.is_ok());
        assert!(Status::Ignored.is_ok());
        assert!(!Status::NotAttempted.is_ok());
        assert!(Status::Failed.is_retryable());
        assert!(!Status::FailedDiscard.is_retryable());
        assert!(Status::FailedDiscard.is_failure());
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&Status::FailedDiscard).unwrap(),
            "\"FAILED_DISCARD\""
        );
        assert_eq!(serde_json::to_string(&Phase::Thing).unwrap(), "\"THING\"");
    }
}
