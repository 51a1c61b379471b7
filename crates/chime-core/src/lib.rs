//! chime-core: notification admission and sequencing model.
//!
//! Pure library. Every operation takes the current time as a parameter;
//! nothing here touches the filesystem, spawns processes, or reads a clock.
//! The IO boundaries live in `chime-state` (persistence) and `chime-player`
//! (playback), and `chime-scheduler` wires them together.

pub mod admission;
pub mod config;
pub mod error;
pub mod lease;
pub mod queue;
pub mod quiet_hours;
pub mod rate_limit;
pub mod state;
pub mod types;

pub use admission::{AdmissionPolicy, AdmissionResult, decide, recheck_at_dispatch};
pub use config::{EventOverride, GlobalConfig, Profile, WorkspaceOverride, resolve};
pub use error::CoreError;
pub use lease::{DrainLease, LeaseAcquire, LeaseHolder};
pub use queue::{DropPolicy, EnqueueOutcome, PendingPlaybackEntry, PlaybackQueue};
pub use quiet_hours::{QuietHours, TimeOfDay};
pub use rate_limit::TokenBucket;
pub use state::{PersistedState, QuickDisableWindow};
pub use types::{EffectiveEventConfig, Event, EventKind, Moment};
