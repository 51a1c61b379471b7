//! Error types for sound resolution and playback.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("sound not found: {0}")]
    SoundNotFound(String),

    #[error("no audio player found (tried afplay, paplay, pw-play, ffplay, aplay)")]
    NoBackend,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("player io error: {0}")]
    Io(#[from] std::io::Error),
}
