//! Parse error types.

use thiserror::Error;

/// Failure turning JSON into a Thing or Action.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a json object")]
    NotAnObject,

    #[error("missing discriminator field {key:?}")]
    MissingDiscriminator { key: &'static str },

    #[error("unknown {key} {name:?}")]
    Unknown { key: &'static str, name: String },

    #[error("{variant}: missing required field {field:?}")]
    MissingField {
        variant: &'static str,
        field: &'static str,
    },

    #[error("{variant}: field {field:?} should be {expected}")]
    InvalidField {
        variant: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}
