//! Drain lease: the exclusive right to pop and dispatch queue entries.
//!
//! The lease lives inside the persisted state, so acquiring it is only
//! atomic when done under the store lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of one invocation competing for the lease.
///
/// `token` disambiguates holders that share a PID (reused PIDs, or
/// several drainers inside one test process).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseHolder {
    pub pid: u32,
    pub token: String,
}

impl LeaseHolder {
    pub fn new(pid: u32, token: impl Into<String>) -> Self {
        Self {
            pid,
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainLease {
    pub holder_pid: u32,
    pub holder_token: String,
    pub acquired_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
}

impl DrainLease {
    pub fn new(holder: &LeaseHolder, now: DateTime<Utc>) -> Self {
        Self {
            holder_pid: holder.pid,
            holder_token: holder.token.clone(),
            acquired_at: now,
            heartbeat_at: now,
        }
    }

    pub fn is_held_by(&self, holder: &LeaseHolder) -> bool {
        self.holder_pid == holder.pid && self.holder_token == holder.token
    }

    /// Stale when the last heartbeat is strictly older than `stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        let age = now - self.heartbeat_at;
        match age.to_std() {
            Ok(age) => age > stale_after,
            // Heartbeat in the future: a skewed clock, not a dead holder.
            Err(_) => false,
        }
    }
}

/// Outcome of a lease acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseAcquire {
    /// No lease was held; we now hold it.
    Acquired,
    /// We already held it (heartbeat refreshed).
    Renewed,
    /// A stale or orphaned lease was taken over.
    Reclaimed { previous: DrainLease },
    /// Someone else holds a live lease.
    Busy { holder_pid: u32 },
}

impl LeaseAcquire {
    pub fn is_leader(&self) -> bool {
        !matches!(self, Self::Busy { .. })
    }
}
