//! chime-state: persisted state IO boundary.
//! One JSON file per user, written atomically (temp file + rename) and
//! guarded by an advisory lock on a sibling `.lock` file. No decision
//! logic lives here.

pub mod error;
pub mod liveness;
pub mod lock;
pub mod store;

pub use error::StateError;
pub use liveness::process_alive;
pub use lock::FileLock;
pub use store::StateStore;
