//! chime-player: playback dispatcher IO boundary.
//! Resolves sound specifiers to files and runs an external player binary
//! under a hard timeout. No admission or ordering logic.

pub mod backend;
pub mod error;
pub mod player;
pub mod sound;

pub use backend::Backend;
pub use error::PlayerError;
pub use player::{CommandPlayer, Player};
pub use sound::SoundResolver;
