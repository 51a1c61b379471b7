//! Error types for the pure core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid event kind: {0:?}")]
    InvalidEventKind(String),

    #[error("invalid time of day {0:?} (expected HH:MM)")]
    InvalidTimeOfDay(String),
}
