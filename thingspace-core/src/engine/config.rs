//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::model::JsonConfig;
use crate::space::SpaceConfig;

/// Engine tuning, loadable from JSON. Missing fields take their defaults.
///
/// ```rust
/// use thingspace_core::engine::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "space": { "capacity": 16 } }"#).unwrap();
/// assert_eq!(config.space.capacity, 16);
/// assert_eq!(config.retry_limit, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub space: SpaceConfig,
    pub json: JsonConfig,
    /// Upper bound on rederive rounds after one transaction.
    pub max_rederive_passes: usize,
    /// Sends attempted per queued Action before it is dropped.
    pub retry_limit: u32,
    /// Name of the Space thread.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            space: SpaceConfig::default(),
            json: JsonConfig::default(),
            max_rederive_passes: 8,
            retry_limit: 5,
            thread_name: "thingspace".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start the space thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}
