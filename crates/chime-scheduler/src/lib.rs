//! chime-scheduler: turns independently spawned event invocations into one
//! ordered, non-overlapping playback stream.
//!
//! Each invocation admits its event and enqueues it under the state lock,
//! then competes for the drain lease. The winner drains the shared queue,
//! dispatching one entry at a time with spacing; everyone else exits and
//! leaves their entry to the leader.

pub mod clock;
pub mod scheduler;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{DrainReport, Outcome, Scheduler, SchedulerSettings, should_log_outcome};
pub use source::{ConfigSource, LayeredConfig, Resolution};
