//! Error types for the state store.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("timed out after {waited:?} waiting for state lock {path:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StateError {
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
