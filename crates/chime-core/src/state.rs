//! The persisted aggregate shared by all invocations.
//!
//! Every field is read-modify-written as a whole under the store lock;
//! the methods here are the only mutations callers should make.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::lease::{DrainLease, LeaseAcquire, LeaseHolder};
use crate::queue::PlaybackQueue;
use crate::rate_limit::TokenBucket;
use crate::types::EventKind;

pub const STATE_VERSION: u32 = 1;

/// Temporary global mute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickDisableWindow {
    pub until: DateTime<Utc>,
    /// Profile to switch to once the window expires.
    #[serde(default)]
    pub resume_profile: Option<String>,
}

impl QuickDisableWindow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub version: u32,
    /// Last dispatch time per kind.
    pub cooldowns: BTreeMap<EventKind, DateTime<Utc>>,
    pub rate_limits: BTreeMap<EventKind, TokenBucket>,
    pub global_rate_limit: Option<TokenBucket>,
    pub quick_disable: Option<QuickDisableWindow>,
    /// Runtime profile selection; wins over the config's `active_profile`.
    pub profile_override: Option<String>,
    pub playback_queue: PlaybackQueue,
    pub drain_lease: Option<DrainLease>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            cooldowns: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            global_rate_limit: None,
            quick_disable: None,
            profile_override: None,
            playback_queue: PlaybackQueue::new(),
            drain_lease: None,
        }
    }
}

/// Bucket for `per_minute`, reshaped if the stored one was built from
/// different limits, refilled to `now`.
fn shaped_bucket(stored: Option<&TokenBucket>, per_minute: u32, now: DateTime<Utc>) -> TokenBucket {
    let mut bucket = match stored {
        Some(b) => b.clone(),
        None => return TokenBucket::per_minute(per_minute, now),
    };
    if !bucket.matches_per_minute(per_minute) {
        bucket.reshape(per_minute, f64::from(per_minute) / 60.0);
    }
    bucket.refill(now);
    bucket
}

impl PersistedState {
    /// Repair invariants after loading from disk.
    pub fn normalize(&mut self) {
        self.playback_queue.normalize();
        for bucket in self.rate_limits.values_mut() {
            bucket.tokens = bucket.tokens.clamp(0.0, f64::from(bucket.capacity));
        }
        if let Some(bucket) = self.global_rate_limit.as_mut() {
            bucket.tokens = bucket.tokens.clamp(0.0, f64::from(bucket.capacity));
        }
    }

    // ─── Quick Disable ───────────────────────────────────────────

    pub fn quick_disable_active(&self, now: DateTime<Utc>) -> bool {
        self.quick_disable
            .as_ref()
            .is_some_and(|window| window.is_active(now))
    }

    /// Clear an expired window, applying its resume profile.
    ///
    /// Returns the cleared window, if any.
    pub fn clear_expired_quick_disable(&mut self, now: DateTime<Utc>) -> Option<QuickDisableWindow> {
        let expired = self
            .quick_disable
            .as_ref()
            .is_some_and(|window| !window.is_active(now));
        if !expired {
            return None;
        }
        let window = self.quick_disable.take()?;
        if let Some(profile) = &window.resume_profile {
            self.profile_override = Some(profile.clone());
        }
        Some(window)
    }

    // ─── Cooldown & Rate Limit ───────────────────────────────────

    /// Remaining cooldown for `kind`, or `None` when it may play.
    pub fn cooldown_remaining(
        &self,
        kind: &EventKind,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = self.cooldowns.get(kind)?;
        let window = Duration::from_secs(cooldown_secs);
        // A stamp in the future (clock skew) counts as just played.
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < window {
            Some(window - elapsed)
        } else {
            None
        }
    }

    /// View of the per-kind bucket at `now`.
    pub fn kind_bucket(&self, kind: &EventKind, per_minute: u32, now: DateTime<Utc>) -> TokenBucket {
        shaped_bucket(self.rate_limits.get(kind), per_minute, now)
    }

    /// View of the global bucket at `now`.
    pub fn global_bucket(&self, per_minute: u32, now: DateTime<Utc>) -> TokenBucket {
        shaped_bucket(self.global_rate_limit.as_ref(), per_minute, now)
    }

    /// Apply the consequences of a dispatch attempt: stamp the cooldown
    /// and take one token from each applicable bucket.
    pub fn record_dispatch(
        &mut self,
        kind: &EventKind,
        now: DateTime<Utc>,
        per_minute: Option<u32>,
        global_per_minute: Option<u32>,
    ) {
        self.cooldowns.insert(kind.clone(), now);

        match per_minute {
            Some(limit) => {
                let mut bucket = self.kind_bucket(kind, limit, now);
                bucket.consume(now);
                self.rate_limits.insert(kind.clone(), bucket);
            }
            None => {
                self.rate_limits.remove(kind);
            }
        }

        self.global_rate_limit = global_per_minute.map(|limit| {
            let mut bucket = self.global_bucket(limit, now);
            bucket.consume(now);
            bucket
        });
    }

    // ─── Drain Lease ─────────────────────────────────────────────

    /// Try to become the drainer.
    ///
    /// A held lease is reclaimable when its heartbeat is older than
    /// `stale_after`, or when `holder_alive` reports its process gone.
    /// `holder_alive` is never consulted for a lease held by our own PID.
    pub fn try_acquire_lease(
        &mut self,
        holder: &LeaseHolder,
        now: DateTime<Utc>,
        stale_after: Duration,
        holder_alive: impl Fn(u32) -> bool,
    ) -> LeaseAcquire {
        let Some(current) = self.drain_lease.as_mut() else {
            self.drain_lease = Some(DrainLease::new(holder, now));
            return LeaseAcquire::Acquired;
        };

        if current.is_held_by(holder) {
            current.heartbeat_at = now;
            return LeaseAcquire::Renewed;
        }

        let orphaned = current.holder_pid != holder.pid && !holder_alive(current.holder_pid);
        if orphaned || current.is_stale(now, stale_after) {
            let previous = std::mem::replace(current, DrainLease::new(holder, now));
            return LeaseAcquire::Reclaimed { previous };
        }

        LeaseAcquire::Busy {
            holder_pid: current.holder_pid,
        }
    }

    /// Refresh our heartbeat. Returns `false` if we no longer hold the lease.
    pub fn heartbeat(&mut self, holder: &LeaseHolder, now: DateTime<Utc>) -> bool {
        match self.drain_lease.as_mut() {
            Some(lease) if lease.is_held_by(holder) => {
                lease.heartbeat_at = now;
                true
            }
            _ => false,
        }
    }

    /// Drop the lease if we hold it.
    pub fn release_lease(&mut self, holder: &LeaseHolder) -> bool {
        let held = self
            .drain_lease
            .as_ref()
            .is_some_and(|lease| lease.is_held_by(holder));
        if held {
            self.drain_lease = None;
        }
        held
    }
}
